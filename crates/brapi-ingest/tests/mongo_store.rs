//! Ingestion against a real MongoDB server

mod common;

use brapi_ingest::metadata::MetadataRegistrar;
use brapi_ingest::vcf::VcfHeader;
use brapi_ingest::{IngestError, StudyId, VariantStore};
use common::{pipeline, TestMongo, SAMPLE1};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sample1_round_trip() {
    let mongo = TestMongo::start().await.unwrap();
    let (pipeline, _dir) = pipeline(mongo.handle(), 2);

    let report = pipeline
        .ingest_upload("sample1.vcf", SAMPLE1.as_bytes().to_vec())
        .await
        .unwrap();
    assert_eq!(report.call_set_count, 2);
    assert_eq!(report.variant_count, 5);

    let documents: Vec<Document> = mongo
        .store()
        .database()
        .collection::<Document>("genomic_data_sample1")
        .find(doc! {})
        .sort(doc! { "POS": 1 })
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let source_rows: Vec<&str> = SAMPLE1.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(documents.len(), source_rows.len());

    for (document, line) in documents.iter().zip(source_rows) {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(document.get_str("CHROM").unwrap(), fields[0]);
        assert_eq!(document.get_i64("POS").unwrap().to_string(), fields[1]);
        assert_eq!(document.get_str("ID").unwrap(), fields[2]);
        match fields[5] {
            "." => assert_eq!(document.get("QUAL"), Some(&Bson::Null)),
            qual => assert_eq!(document.get_f64("QUAL").unwrap(), qual.parse::<f64>().unwrap()),
        }
        assert_eq!(document.get_str("INFO").unwrap(), fields[7]);
        assert_eq!(document.get_str("FORMAT").unwrap(), fields[8]);
        assert_eq!(document.get_str("S1").unwrap(), fields[9]);
        assert_eq!(document.get_str("S2").unwrap(), fields[10]);
        assert_eq!(document.get_str("study_db_id").unwrap(), "genomic_data_sample1");
    }

    let metadata = mongo
        .store()
        .database()
        .collection::<Document>("vcf_metadata")
        .find_one(doc! { "study_db_id": "genomic_data_sample1" })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(metadata.get_i64("call_set_count").unwrap(), 2);
    assert_eq!(metadata.get_i64("variant_count").unwrap(), 5);
    assert_eq!(metadata.get_str("variant_set_name").unwrap(), "Run1");
    assert_eq!(metadata.get_array("metadata_fields").unwrap().len(), 3);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reingest_leaves_state_unchanged() {
    let mongo = TestMongo::start().await.unwrap();
    let (pipeline, _dir) = pipeline(mongo.handle(), 100);

    pipeline
        .ingest_upload("sample1.vcf", SAMPLE1.as_bytes().to_vec())
        .await
        .unwrap();
    let err = pipeline
        .ingest_upload("sample1.vcf", SAMPLE1.as_bytes().to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::DuplicateStudy(_)));

    let database = mongo.store().database();
    let rows = database
        .collection::<Document>("genomic_data_sample1")
        .count_documents(doc! {})
        .await
        .unwrap();
    let records = database
        .collection::<Document>("vcf_metadata")
        .count_documents(doc! {})
        .await
        .unwrap();
    assert_eq!(rows, 5);
    assert_eq!(records, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unique_index_reports_duplicate() {
    let mongo = TestMongo::start().await.unwrap();
    let study = StudyId::parse("genomic_data_race").unwrap();
    let header =
        VcfHeader::from_lines(vec![], "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
    let metadata = MetadataRegistrar::default().build(&study, &header, 0, "http://h/static/race.vcf");

    mongo.store().append_metadata(&metadata).await.unwrap();
    let err = mongo.store().append_metadata(&metadata).await.unwrap_err();

    assert!(matches!(err, IngestError::DuplicateStudy(ref id) if id == "genomic_data_race"));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_failed_ingest_drops_collection() {
    let mongo = TestMongo::start().await.unwrap();
    let (pipeline, _dir) = pipeline(mongo.handle(), 2);
    let broken = format!("{}1\tsix hundred\t.\tA\tC\t.\tPASS\t.\tGT\t0|1\t0|0\n", SAMPLE1);

    let err = pipeline
        .ingest_upload("broken.vcf", broken.into_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::MalformedRecord { line: 10, .. }));

    let names = mongo
        .store()
        .database()
        .list_collection_names()
        .await
        .unwrap();
    assert!(!names.contains(&"genomic_data_broken".to_string()));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_document_id_sample_column_rejected() {
    let mongo = TestMongo::start().await.unwrap();
    let (pipeline, _dir) = pipeline(mongo.handle(), 2);
    let vcf = "##fileformat=VCFv4.2\n\
               #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t_id\n\
               1\t100\t.\tA\tC\t.\tPASS\t.\tGT\t0|1\n\
               1\t200\t.\tG\tT\t.\tPASS\t.\tGT\t0|1\n";

    let err = pipeline
        .ingest_upload("clash.vcf", vcf.as_bytes().to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::MalformedHeader(ref m) if m.contains("_id")));

    let names = mongo
        .store()
        .database()
        .list_collection_names()
        .await
        .unwrap();
    assert!(!names.contains(&"genomic_data_clash".to_string()));
}
