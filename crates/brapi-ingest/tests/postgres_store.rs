//! Ingestion against a real PostgreSQL server

mod common;

use brapi_ingest::metadata::{static_catalog, MetadataField, MetadataRegistrar};
use brapi_ingest::vcf::VcfHeader;
use brapi_ingest::{IngestError, StudyId, VariantStore};
use common::{pipeline, TestPostgres, SAMPLE1};
use sqlx::types::Json;

type VariantRow = (
    String,
    i64,
    String,
    String,
    String,
    Option<f64>,
    String,
    String,
    String,
    String,
    String,
    String,
);

async fn table_exists(pg: &TestPostgres, table: &str) -> bool {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
    )
    .bind(table)
    .fetch_one(pg.store().pool())
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sample1_round_trip() {
    let pg = TestPostgres::start().await.unwrap();
    let (pipeline, _dir) = pipeline(pg.handle(), 2);

    let report = pipeline
        .ingest_upload("sample1.vcf", SAMPLE1.as_bytes().to_vec())
        .await
        .unwrap();
    assert_eq!(report.call_set_count, 2);
    assert_eq!(report.variant_count, 5);
    assert_eq!(report.batches, 3);

    let rows: Vec<VariantRow> = sqlx::query_as(
        "SELECT \"CHROM\", \"POS\", \"ID\", \"REF\", \"ALT\", \"QUAL\", \"FILTER\", \"INFO\", \
         \"FORMAT\", \"S1\", \"S2\", study_db_id FROM \"genomic_data_sample1\" ORDER BY \"POS\"",
    )
    .fetch_all(pg.store().pool())
    .await
    .unwrap();

    let source_rows: Vec<&str> = SAMPLE1.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(rows.len(), source_rows.len());

    for (row, line) in rows.iter().zip(source_rows) {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(row.0, fields[0]);
        assert_eq!(row.1.to_string(), fields[1]);
        assert_eq!(row.2, fields[2]);
        assert_eq!(row.3, fields[3]);
        assert_eq!(row.4, fields[4]);
        match fields[5] {
            "." => assert_eq!(row.5, None),
            qual => assert_eq!(row.5, Some(qual.parse::<f64>().unwrap())),
        }
        assert_eq!(row.6, fields[6]);
        assert_eq!(row.7, fields[7]);
        assert_eq!(row.8, fields[8]);
        assert_eq!(row.9, fields[9]);
        assert_eq!(row.10, fields[10]);
        assert_eq!(row.11, "genomic_data_sample1");
    }

    let (call_set_count, variant_count, variant_set_db_id, fields): (
        i64,
        i64,
        String,
        Json<Vec<MetadataField>>,
    ) = sqlx::query_as(
        "SELECT call_set_count, variant_count, variant_set_db_id, metadata_fields \
         FROM vcf_metadata WHERE study_db_id = $1",
    )
    .bind("genomic_data_sample1")
    .fetch_one(pg.store().pool())
    .await
    .unwrap();

    assert_eq!(call_set_count, 2);
    assert_eq!(variant_count, 5);
    assert_eq!(variant_set_db_id, "genomic_data_sample1-Run1");
    assert_eq!(fields.0, static_catalog());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reingest_leaves_state_unchanged() {
    let pg = TestPostgres::start().await.unwrap();
    let (pipeline, _dir) = pipeline(pg.handle(), 100);

    pipeline
        .ingest_upload("sample1.vcf", SAMPLE1.as_bytes().to_vec())
        .await
        .unwrap();
    let err = pipeline
        .ingest_upload("sample1.vcf", SAMPLE1.as_bytes().to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::DuplicateStudy(_)));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM \"genomic_data_sample1\"")
        .fetch_one(pg.store().pool())
        .await
        .unwrap();
    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vcf_metadata")
        .fetch_one(pg.store().pool())
        .await
        .unwrap();
    assert_eq!(rows, 5);
    assert_eq!(records, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_malformed_record_leaves_no_table() {
    let pg = TestPostgres::start().await.unwrap();
    let (pipeline, _dir) = pipeline(pg.handle(), 2);
    let broken = format!("{}1\t600\tnot-enough-fields\n", SAMPLE1);

    let err = pipeline
        .ingest_upload("broken.vcf", broken.into_bytes())
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::MalformedRecord { .. }));
    assert!(!table_exists(&pg, "genomic_data_broken").await);
    assert!(!pg.store().exists_study(&StudyId::parse("genomic_data_broken").unwrap()).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unique_constraint_reports_duplicate() {
    let pg = TestPostgres::start().await.unwrap();
    let study = StudyId::parse("genomic_data_race").unwrap();
    let header =
        VcfHeader::from_lines(vec![], "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
    let metadata = MetadataRegistrar::default().build(&study, &header, 0, "http://h/static/race.vcf");

    pg.store().append_metadata(&metadata).await.unwrap();
    let err = pg.store().append_metadata(&metadata).await.unwrap_err();

    assert!(matches!(err, IngestError::DuplicateStudy(ref id) if id == "genomic_data_race"));
    assert!(pg.store().exists_study(&study).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_create_or_replace_drops_previous_rows() {
    let pg = TestPostgres::start().await.unwrap();
    let store = pg.store();
    let study = StudyId::parse("genomic_data_replace").unwrap();
    let header =
        VcfHeader::from_lines(vec![], "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
    let row = brapi_ingest::vcf::VariantRecord::parse_line("1\t1\t.\tA\tC\t.\tPASS\t.", &header, 2)
        .unwrap();

    store.create_or_replace(&study, &header).await.unwrap();
    assert_eq!(store.bulk_insert(&study, &header, 0, &[row.clone(), row]).await.unwrap(), 2);

    store.create_or_replace(&study, &header).await.unwrap();
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM \"genomic_data_replace\"")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(rows, 0);

    store.discard(&study).await.unwrap();
    assert!(!table_exists(&pg, "genomic_data_replace").await);
}
