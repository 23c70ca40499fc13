// src/ingest/parquet.rs
//! Columnar codec for the article dataset and the user export.

use std::sync::Arc;

use arrow::array::*;
use arrow::array::AsArray;
use arrow::compute::cast;
use arrow::datatypes::*;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::{ExportError, LoadError};
use crate::record::{RawRow, RawTimestamp, Record};
use crate::users::UserRow;

// Accepted column names per field, first match wins.
const ID_COLS: &[&str] = &["id"];
const TITLE_COLS: &[&str] = &["art2_title", "title"];
const BODY_COLS: &[&str] = &["art2_content", "art2_text", "content"];
const DATE_COLS: &[&str] = &["art2_date", "date"];
const COMPANY_COLS: &[&str] = &["company_name", "company"];
const CATEGORY_COLS: &[&str] = &["category"];
const SENTIMENT_COLS: &[&str] = &["sentiment_score", "sentiment"];
const URL_COLS: &[&str] = &["art2_url", "url"];

fn snappy_props() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_dictionary_enabled(true)
        .build()
}

/// Column positions resolved once per file.
#[derive(Debug)]
struct ArticleColumns {
    id: Option<usize>,
    title: usize,
    body: usize,
    date: usize,
    company: usize,
    category: usize,
    sentiment: usize,
    url: usize,
}

fn find(schema: &Schema, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| schema.index_of(n).ok())
}

fn require(schema: &Schema, names: &[&str]) -> Result<usize, LoadError> {
    find(schema, names).ok_or_else(|| LoadError::SchemaMismatch(names[0].to_string()))
}

impl ArticleColumns {
    fn resolve(schema: &Schema) -> Result<Self, LoadError> {
        Ok(Self {
            id: find(schema, ID_COLS),
            title: require(schema, TITLE_COLS)?,
            body: require(schema, BODY_COLS)?,
            date: require(schema, DATE_COLS)?,
            company: require(schema, COMPANY_COLS)?,
            category: require(schema, CATEGORY_COLS)?,
            sentiment: require(schema, SENTIMENT_COLS)?,
            url: require(schema, URL_COLS)?,
        })
    }
}

/// Decode a parquet file into raw rows. Cell-level problems surface as
/// `None` fields for the normalizer; file-level problems are errors.
pub fn decode_articles(data: Bytes) -> Result<Vec<RawRow>, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;
    let cols = ArticleColumns::resolve(builder.schema())?;
    let reader = builder.build()?;

    let mut out = Vec::new();
    // Row ordinal stands in for the id when the file has no id column.
    let mut ordinal: i64 = 0;
    for batch in reader {
        let batch = batch?;
        let n = batch.num_rows();

        let ids = match cols.id {
            Some(i) => int_cells(batch.column(i))?,
            None => (ordinal..ordinal + n as i64).map(Some).collect(),
        };
        let titles = string_cells(batch.column(cols.title))?;
        let bodies = string_cells(batch.column(cols.body))?;
        let dates = timestamp_cells(batch.column(cols.date))?;
        let companies = string_cells(batch.column(cols.company))?;
        let categories = string_cells(batch.column(cols.category))?;
        let sentiments = float_cells(batch.column(cols.sentiment))?;
        let urls = string_cells(batch.column(cols.url))?;

        let rows = ids
            .into_iter()
            .zip(titles)
            .zip(bodies)
            .zip(dates)
            .zip(companies)
            .zip(categories)
            .zip(sentiments)
            .zip(urls)
            .map(
                |(((((((id, title), body), published_at), company), category), sentiment), url)| {
                    RawRow {
                        id,
                        title,
                        body,
                        published_at,
                        company,
                        category,
                        sentiment,
                        url,
                    }
                },
            );
        out.extend(rows);
        ordinal += n as i64;
    }
    Ok(out)
}

fn string_cells(col: &ArrayRef) -> Result<Vec<Option<String>>, LoadError> {
    let arr = cast(col, &DataType::Utf8)?;
    let strings = arr
        .as_string_opt::<i32>()
        .ok_or_else(|| LoadError::Parse(format!("expected text, got {}", col.data_type())))?;
    Ok(strings.iter().map(|v| v.map(str::to_string)).collect())
}

fn int_cells(col: &ArrayRef) -> Result<Vec<Option<i64>>, LoadError> {
    let arr = cast(col, &DataType::Int64)?;
    let ints = arr
        .as_primitive_opt::<Int64Type>()
        .ok_or_else(|| LoadError::Parse(format!("expected integer, got {}", col.data_type())))?;
    Ok(ints.iter().collect())
}

fn float_cells(col: &ArrayRef) -> Result<Vec<Option<f64>>, LoadError> {
    let arr = cast(col, &DataType::Float64)?;
    let floats = arr
        .as_primitive_opt::<Float64Type>()
        .ok_or_else(|| LoadError::Parse(format!("expected float, got {}", col.data_type())))?;
    Ok(floats.iter().collect())
}

fn primitive_cells<T, F>(col: &ArrayRef, to_ts: F) -> Result<Vec<Option<RawTimestamp>>, LoadError>
where
    T: ArrowPrimitiveType,
    F: Fn(T::Native) -> Option<DateTime<chrono::Utc>>,
{
    let arr = col
        .as_primitive_opt::<T>()
        .ok_or_else(|| LoadError::Parse(format!("unexpected layout for {}", col.data_type())))?;
    Ok(arr
        .iter()
        .map(|v| v.and_then(&to_ts).map(RawTimestamp::Instant))
        .collect())
}

// Naive timestamps are taken as UTC wall clock.
fn timestamp_cells(col: &ArrayRef) -> Result<Vec<Option<RawTimestamp>>, LoadError> {
    match col.data_type() {
        DataType::Timestamp(TimeUnit::Second, _) => {
            primitive_cells::<TimestampSecondType, _>(col, |v| DateTime::from_timestamp(v, 0))
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            primitive_cells::<TimestampMillisecondType, _>(col, DateTime::from_timestamp_millis)
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            primitive_cells::<TimestampMicrosecondType, _>(col, DateTime::from_timestamp_micros)
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            primitive_cells::<TimestampNanosecondType, _>(col, |v| {
                Some(DateTime::from_timestamp_nanos(v))
            })
        }
        DataType::Date32 => primitive_cells::<Date32Type, _>(col, |days| {
            DateTime::from_timestamp(i64::from(days) * 86_400, 0)
        }),
        DataType::Date64 => {
            primitive_cells::<Date64Type, _>(col, DateTime::from_timestamp_millis)
        }
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Ok(string_cells(col)?
            .into_iter()
            .map(|v| v.map(RawTimestamp::Text))
            .collect()),
        other => Err(LoadError::Parse(format!(
            "unsupported timestamp column type {other}"
        ))),
    }
}

fn article_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("art2_title", DataType::Utf8, false),
        Field::new("art2_content", DataType::Utf8, true),
        Field::new(
            "art2_date",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("company_name", DataType::Utf8, false),
        Field::new("category", DataType::Utf8, false),
        Field::new("sentiment_score", DataType::Float64, false),
        Field::new("art2_url", DataType::Utf8, true),
    ]))
}

/// Encode articles in the same layout the loader reads.
pub fn encode_articles(records: &[Record]) -> Result<Vec<u8>, ExportError> {
    let mut id = Int64Builder::new();
    let mut title = StringBuilder::new();
    let mut body = StringBuilder::new();
    let mut date = TimestampMicrosecondBuilder::new().with_timezone("UTC");
    let mut company = StringBuilder::new();
    let mut category = StringBuilder::new();
    let mut sentiment = Float64Builder::new();
    let mut url = StringBuilder::new();

    for r in records {
        id.append_value(r.id);
        title.append_value(&r.title);
        body.append_value(&r.body);
        date.append_value(r.published_at.timestamp_micros());
        company.append_value(&r.company);
        category.append_value(&r.category);
        sentiment.append_value(r.sentiment);
        url.append_value(&r.url);
    }

    let batch = RecordBatch::try_new(
        article_schema(),
        vec![
            Arc::new(id.finish()),
            Arc::new(title.finish()),
            Arc::new(body.finish()),
            Arc::new(date.finish()),
            Arc::new(company.finish()),
            Arc::new(category.finish()),
            Arc::new(sentiment.finish()),
            Arc::new(url.finish()),
        ],
    )?;
    write_batch(&batch)
}

fn user_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("username", DataType::Utf8, false),
        Field::new("email", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, true),
        Field::new("last_login", DataType::Utf8, true),
    ]))
}

/// Encode the user table for the sync export.
pub fn encode_users(rows: &[UserRow]) -> Result<Vec<u8>, ExportError> {
    let mut id = Int64Builder::new();
    let mut username = StringBuilder::new();
    let mut email = StringBuilder::new();
    let mut created_at = StringBuilder::new();
    let mut last_login = StringBuilder::new();

    for r in rows {
        id.append_value(r.id);
        username.append_value(&r.username);
        email.append_value(&r.email);
        created_at.append_option(r.created_at.as_deref());
        last_login.append_option(r.last_login.as_deref());
    }

    let batch = RecordBatch::try_new(
        user_schema(),
        vec![
            Arc::new(id.finish()),
            Arc::new(username.finish()),
            Arc::new(email.finish()),
            Arc::new(created_at.finish()),
            Arc::new(last_login.finish()),
        ],
    )?;
    write_batch(&batch)
}

fn write_batch(batch: &RecordBatch) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(snappy_props()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn write(batch: RecordBatch) -> Bytes {
        Bytes::from(write_batch(&batch).unwrap())
    }

    #[test]
    fn reads_generator_style_columns_without_id() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("art2_title", DataType::Utf8, true),
            Field::new("art2_text", DataType::Utf8, true),
            Field::new("art2_date", DataType::Timestamp(TimeUnit::Nanosecond, None), true),
            Field::new("company_name", DataType::Utf8, true),
            Field::new("category", DataType::Utf8, true),
            Field::new("sentiment_score", DataType::Float64, true),
            Field::new("url", DataType::Utf8, true),
        ]));
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("a"), Some("b")])),
                Arc::new(StringArray::from(vec![Some("body"), None])),
                Arc::new(TimestampNanosecondArray::from(vec![
                    Some(ts.timestamp_nanos_opt().unwrap()),
                    None,
                ])),
                Arc::new(StringArray::from(vec![Some("Apple"), Some("Tesla")])),
                Arc::new(StringArray::from(vec![Some("Tech"), Some("Auto")])),
                Arc::new(Float64Array::from(vec![Some(0.3), Some(-0.2)])),
                Arc::new(StringArray::from(vec![Some("https://x"), Some("https://y")])),
            ],
        )
        .unwrap();

        let rows = decode_articles(write(batch)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, Some(0));
        assert_eq!(rows[1].id, Some(1));
        assert_eq!(rows[0].published_at, Some(RawTimestamp::Instant(ts)));
        assert_eq!(rows[1].published_at, None);
        assert_eq!(rows[1].body, None);
        assert_eq!(rows[0].company.as_deref(), Some("Apple"));
    }

    #[test]
    fn string_dates_are_left_for_the_normalizer() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("date", DataType::Utf8, false),
            Field::new("company", DataType::Utf8, false),
            Field::new("category", DataType::Utf8, false),
            Field::new("sentiment", DataType::Float32, false),
            Field::new("art2_url", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![7])),
                Arc::new(StringArray::from(vec!["t"])),
                Arc::new(StringArray::from(vec!["c"])),
                Arc::new(StringArray::from(vec!["2024-05-01 08:00:00"])),
                Arc::new(StringArray::from(vec!["Apple"])),
                Arc::new(StringArray::from(vec!["Tech"])),
                Arc::new(Float32Array::from(vec![0.5f32])),
                Arc::new(StringArray::from(vec!["https://x"])),
            ],
        )
        .unwrap();
        let rows = decode_articles(write(batch)).unwrap();
        assert_eq!(rows[0].id, Some(7));
        assert_eq!(
            rows[0].published_at,
            Some(RawTimestamp::Text("2024-05-01 08:00:00".into()))
        );
        assert_eq!(rows[0].sentiment, Some(0.5));
    }

    #[test]
    fn null_id_cell_stays_null_when_column_present() {
        let rec = |id| Record {
            id,
            title: "t".into(),
            body: "b".into(),
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            company: "Acme".into(),
            category: "Tech".into(),
            sentiment: 0.0,
            url: String::new(),
        };
        let bytes = encode_articles(&[rec(5), rec(0)]).unwrap();
        let decoded = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))
            .unwrap()
            .build()
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        let mut columns = decoded.columns().to_vec();
        columns[0] = Arc::new(Int64Array::from(vec![None, Some(0)]));
        let nullable_id = Arc::new(Schema::new(
            decoded
                .schema()
                .fields()
                .iter()
                .map(|f| f.as_ref().clone().with_nullable(true))
                .collect::<Vec<_>>(),
        ));
        let batch = RecordBatch::try_new(nullable_id, columns).unwrap();

        let rows = decode_articles(write(batch)).unwrap();
        assert_eq!(rows[0].id, None);
        assert_eq!(rows[1].id, Some(0));
    }

    #[test]
    fn missing_required_column_is_schema_mismatch() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("art2_title", DataType::Utf8, false),
            Field::new("art2_content", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["t"])),
                Arc::new(StringArray::from(vec!["b"])),
            ],
        )
        .unwrap();
        match decode_articles(write(batch)) {
            Err(LoadError::SchemaMismatch(col)) => assert_eq!(col, "art2_date"),
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = decode_articles(Bytes::from_static(b"not a parquet file")).unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)), "{err:?}");
    }

    #[test]
    fn encoded_articles_decode_with_instants() {
        let ts = Utc.with_ymd_and_hms(2024, 2, 2, 2, 2, 2).unwrap();
        let rec = Record {
            id: 42,
            title: "Hello".into(),
            body: "World".into(),
            published_at: ts,
            company: "Acme".into(),
            category: "Tech".into(),
            sentiment: -0.25,
            url: "https://acme.test".into(),
        };
        let bytes = encode_articles(std::slice::from_ref(&rec)).unwrap();
        let rows = decode_articles(Bytes::from(bytes)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, Some(42));
        assert_eq!(rows[0].published_at, Some(RawTimestamp::Instant(ts)));
        assert_eq!(rows[0].sentiment, Some(-0.25));
    }

    #[test]
    fn users_encode_to_non_empty_parquet() {
        let rows = vec![UserRow {
            id: 1,
            username: "demo_user".into(),
            email: "demo@example.com".into(),
            created_at: Some("2024-01-01 00:00:00".into()),
            last_login: None,
        }];
        let bytes = encode_users(&rows).unwrap();
        // Parquet magic at both ends.
        assert_eq!(&bytes[..4], b"PAR1");
        assert_eq!(&bytes[bytes.len() - 4..], b"PAR1");
    }
}
