use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio::sync::Mutex;
use tokio_postgres::types::{to_sql_checked, Format, FromSql, IsNull, Kind, ToSql, Type};
use tokio_postgres::{Client, NoTls};
use uuid::Uuid;

use crate::drivers::placeholders::{rewrite_placeholders, Rewritten};
use crate::error::DriverError;
use crate::traits::{DatabaseDriver, HandleConfig, ValueMode};
use crate::types::{BindValue, Binding, Placeholder, RawQueryResult, RowValue};

/// PostgreSQL driver implementation using tokio-postgres.
///
/// Queries may use `?` or `:name` placeholders; they are rewritten to `$N`
/// before preparation.
///
/// Writes are serialized so an insert and its `lastval()` lookup are never
/// split by another write on the same session.
pub struct TokioPostgresDriver {
    client: Client,
    stringify: AtomicBool,
    writes: Mutex<()>,
}

impl TokioPostgresDriver {
    /// Connect to a PostgreSQL database.
    pub async fn connect(connection_string: &str) -> Result<Self, DriverError> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;

        // Spawn the connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self::from_client(client))
    }

    /// Wrap an already connected client.
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            stringify: AtomicBool::new(false),
            writes: Mutex::new(()),
        }
    }

    async fn execute_unlocked(&self, sql: &str, params: &[Binding]) -> Result<u64, DriverError> {
        let rewritten = rewrite_placeholders(sql)?;
        let ordered = order_params(&rewritten, params)?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            ordered.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        Ok(self.client.execute(&*rewritten.sql, &param_refs).await?)
    }

    async fn last_insert_id_unlocked(&self, sequence: Option<&str>) -> Result<String, DriverError> {
        let row = match sequence {
            Some(name) => {
                self.client
                    .query_one(insert_id_query(sequence), &[&name])
                    .await?
            }
            None => self.client.query_one(insert_id_query(None), &[]).await?,
        };
        Ok(row.try_get::<_, String>(0)?)
    }
}

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    async fn configure(&self, config: HandleConfig) -> Result<(), DriverError> {
        self.stringify
            .store(config.value_mode == ValueMode::Stringify, Ordering::Relaxed);
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Binding]) -> Result<RawQueryResult, DriverError> {
        let rewritten = rewrite_placeholders(sql)?;
        let ordered = order_params(&rewritten, params)?;
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            ordered.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let statement = self.client.prepare(&*rewritten.sql).await?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = self.client.query(&statement, &param_refs).await?;
        let stringify = self.stringify.load(Ordering::Relaxed);

        let mut result_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for (i, col) in row.columns().iter().enumerate() {
                let raw: RawColumn<'_> = row.try_get(i)?;
                let value = decode_value(col.type_(), raw.0)?;
                values.push(if stringify { value.into_text() } else { value });
            }
            result_rows.push(values);
        }

        Ok(RawQueryResult::new(columns, result_rows))
    }

    async fn execute(&self, sql: &str, params: &[Binding]) -> Result<u64, DriverError> {
        let _guard = self.writes.lock().await;
        self.execute_unlocked(sql, params).await
    }

    async fn last_insert_id(&self, sequence: Option<&str>) -> Result<String, DriverError> {
        let _guard = self.writes.lock().await;
        self.last_insert_id_unlocked(sequence).await
    }

    async fn insert_returning_id(
        &self,
        sql: &str,
        params: &[Binding],
        sequence: Option<&str>,
    ) -> Result<String, DriverError> {
        let _guard = self.writes.lock().await;
        self.execute_unlocked(sql, params).await?;
        self.last_insert_id_unlocked(sequence).await
    }
}

fn insert_id_query(sequence: Option<&str>) -> &'static str {
    match sequence {
        Some(_) => "SELECT currval($1::text::regclass)::text",
        None => "SELECT lastval()::text",
    }
}

/// A bound value sent in text format so the server decides the column type.
#[derive(Debug)]
struct TextParam<'a>(&'a BindValue);

impl ToSql for TextParam<'_> {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self.0 {
            BindValue::Null => return Ok(IsNull::Yes),
            BindValue::Bool(b) => out.extend_from_slice(if *b { b"t" } else { b"f" }),
            BindValue::Int(i) => out.extend_from_slice(i.to_string().as_bytes()),
            BindValue::Str(s) => out.extend_from_slice(s.as_bytes()),
        }
        Ok(IsNull::No)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

/// Arrange bindings in `$N` order.
fn order_params<'a>(
    rewritten: &Rewritten<'_>,
    params: &'a [Binding],
) -> Result<Vec<TextParam<'a>>, DriverError> {
    if rewritten.names.is_empty() {
        let mut positional: Vec<(usize, &BindValue)> = Vec::with_capacity(params.len());
        for binding in params {
            match &binding.placeholder {
                Placeholder::Positional(n) => positional.push((*n, &binding.value)),
                Placeholder::Named(name) => {
                    return Err(DriverError::UnknownParameter(name.clone()))
                }
            }
        }
        positional.sort_by_key(|(n, _)| *n);
        return Ok(positional.into_iter().map(|(_, v)| TextParam(v)).collect());
    }

    for binding in params {
        let known = match &binding.placeholder {
            Placeholder::Named(name) => rewritten.names.iter().any(|n| n == bare_name(name)),
            Placeholder::Positional(_) => false,
        };
        if !known {
            return Err(DriverError::UnknownParameter(placeholder_label(&binding.placeholder)));
        }
    }

    rewritten
        .names
        .iter()
        .map(|name| {
            params
                .iter()
                .find(|b| matches!(&b.placeholder, Placeholder::Named(n) if bare_name(n) == name))
                .map(|b| TextParam(&b.value))
                .ok_or_else(|| DriverError::UnknownParameter(format!(":{}", name)))
        })
        .collect()
}

fn bare_name(name: &str) -> &str {
    name.strip_prefix(':').unwrap_or(name)
}

fn placeholder_label(placeholder: &Placeholder) -> String {
    match placeholder {
        Placeholder::Positional(n) => n.to_string(),
        Placeholder::Named(name) => name.clone(),
    }
}

/// A column's wire bytes, taken as is so decoding can dispatch on the type.
struct RawColumn<'a>(Option<&'a [u8]>);

impl<'a> FromSql<'a> for RawColumn<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawColumn(Some(raw)))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawColumn(None))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// `numeric` rendered as its exact decimal text.
struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        decode_numeric(raw).map(NumericText)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

fn decode<'a, T: FromSql<'a>>(ty: &Type, raw: &'a [u8]) -> Result<T, DriverError> {
    T::from_sql(ty, raw).map_err(|source| DriverError::Decode {
        type_name: ty.name().to_string(),
        source,
    })
}

/// Convert a column's binary value to a RowValue.
///
/// Numbers, booleans and bytea keep their type. Dates, times, json, uuid and
/// numeric come back as text; enums and domains decode as their text or base
/// type.
fn decode_value(ty: &Type, raw: Option<&[u8]>) -> Result<RowValue, DriverError> {
    let Some(raw) = raw else {
        return Ok(RowValue::Null);
    };

    if let Kind::Domain(base) = ty.kind() {
        return decode_value(base, Some(raw));
    }

    let value = if *ty == Type::BOOL {
        RowValue::Bool(decode(ty, raw)?)
    } else if *ty == Type::INT2 {
        RowValue::Int(decode::<i16>(ty, raw)?.into())
    } else if *ty == Type::INT4 {
        RowValue::Int(decode::<i32>(ty, raw)?.into())
    } else if *ty == Type::INT8 {
        RowValue::Int(decode(ty, raw)?)
    } else if *ty == Type::OID {
        RowValue::Int(decode::<u32>(ty, raw)?.into())
    } else if *ty == Type::FLOAT4 {
        RowValue::Float(decode::<f32>(ty, raw)?.into())
    } else if *ty == Type::FLOAT8 {
        RowValue::Float(decode(ty, raw)?)
    } else if *ty == Type::BYTEA {
        RowValue::Blob(decode(ty, raw)?)
    } else if *ty == Type::NUMERIC {
        RowValue::Text(decode::<NumericText>(ty, raw)?.0)
    } else if *ty == Type::TIMESTAMPTZ {
        RowValue::Text(decode::<DateTime<Utc>>(ty, raw)?.to_rfc3339())
    } else if *ty == Type::TIMESTAMP {
        RowValue::Text(decode::<NaiveDateTime>(ty, raw)?.to_string())
    } else if *ty == Type::DATE {
        RowValue::Text(decode::<NaiveDate>(ty, raw)?.to_string())
    } else if *ty == Type::TIME {
        RowValue::Text(decode::<NaiveTime>(ty, raw)?.to_string())
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        RowValue::Text(decode::<serde_json::Value>(ty, raw)?.to_string())
    } else if *ty == Type::UUID {
        RowValue::Text(decode::<Uuid>(ty, raw)?.to_string())
    } else if <String as FromSql>::accepts(ty) || matches!(ty.kind(), Kind::Enum(_)) {
        RowValue::Text(decode(ty, raw)?)
    } else {
        return Err(DriverError::UnsupportedColumnType(ty.name().to_string()));
    };
    Ok(value)
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decode the binary `numeric` layout: digit count, weight, sign and display
/// scale, followed by base-10000 digits.
fn decode_numeric(raw: &[u8]) -> Result<String, Box<dyn Error + Sync + Send>> {
    let word = |index: usize| -> Result<u16, Box<dyn Error + Sync + Send>> {
        raw.get(index * 2..index * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "numeric value is truncated".into())
    };

    let ndigits = usize::from(word(0)?);
    let weight = i32::from(word(1)? as i16);
    let sign = word(2)?;
    let dscale = usize::from(word(3)?);

    match sign {
        0 | NUMERIC_NEG => {}
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        other => return Err(format!("invalid numeric sign 0x{:04x}", other).into()),
    }

    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Result<Vec<u16>, _>>()?;
    let digit = |group: i32| -> u16 {
        usize::try_from(group)
            .ok()
            .and_then(|g| digits.get(g).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(0).to_string());
        for group in 1..=weight {
            out.push_str(&format!("{:04}", digit(group)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut group = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit(group)));
            group += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}
