//! Schema model, YAML persistence, column definitions and type inference.
//!
//! A [`Schema`] is an ordered list of uniquely named [`ColumnMeta`] entries,
//! each carrying a [`ColumnType`]. Schemas are stored next to table data as
//! `schema.yml` and can be inferred from a CSV sample when importing files
//! that arrive without one.

use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, ensure};
use encoding_rs::Encoding;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{data::parse_typed_value, io_utils};

pub const CURRENT_SCHEMA_VERSION: &str = "1.0";
const DECIMAL_MAX_PRECISION: u32 = 28;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DecimalSpec {
    pub precision: u32,
    pub scale: u32,
}

impl DecimalSpec {
    pub fn new(precision: u32, scale: u32) -> Result<Self> {
        let spec = Self { precision, scale };
        spec.ensure_valid()?;
        Ok(spec)
    }

    pub fn ensure_valid(&self) -> Result<()> {
        ensure!(self.precision > 0, "Decimal precision must be positive");
        ensure!(
            self.precision <= DECIMAL_MAX_PRECISION,
            "Decimal precision must be <= {}",
            DECIMAL_MAX_PRECISION
        );
        ensure!(
            self.scale <= self.precision,
            "Decimal scale ({}) cannot exceed precision ({})",
            self.scale,
            self.precision
        );
        Ok(())
    }

    pub fn signature(&self) -> String {
        format!("decimal({},{})", self.precision, self.scale)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    Guid,
    Decimal(DecimalSpec),
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Time => "time",
            ColumnType::Guid => "guid",
            ColumnType::Decimal(_) => "decimal",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "string",
            "integer",
            "float",
            "boolean",
            "date",
            "datetime",
            "time",
            "guid",
            "decimal(precision,scale)",
        ]
    }

    pub fn signature(&self) -> String {
        match self {
            ColumnType::Decimal(spec) => spec.signature(),
            _ => self.as_str().to_string(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Integer | ColumnType::Float | ColumnType::Decimal(_)
        )
    }

    /// Whether values of `self` and `other` can be matched as join keys.
    pub fn is_key_compatible(&self, other: &ColumnType) -> bool {
        match (self, other) {
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                true
            }
            (ColumnType::Decimal(_), ColumnType::Decimal(_)) => true,
            _ => self == other,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "str" | "text" => Ok(ColumnType::String),
            "integer" | "int" | "long" | "bigint" => Ok(ColumnType::Integer),
            "float" | "double" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" | "date-time" | "timestamp" => Ok(ColumnType::DateTime),
            "time" => Ok(ColumnType::Time),
            "guid" | "uuid" => Ok(ColumnType::Guid),
            other if other.starts_with("decimal") => parse_decimal_type(&normalized),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

fn parse_decimal_type(value: &str) -> Result<ColumnType> {
    let inner = value
        .strip_prefix("decimal")
        .map(str::trim)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| anyhow!("Decimal type must look like decimal(18,4), found '{value}'"))?;
    let (precision, scale) = inner
        .split_once(',')
        .ok_or_else(|| anyhow!("Decimal type requires both precision and scale"))?;
    let precision: u32 = precision
        .trim()
        .parse()
        .with_context(|| format!("Invalid decimal precision in '{value}'"))?;
    let scale: u32 = scale
        .trim()
        .parse()
        .with_context(|| format!("Invalid decimal scale in '{value}'"))?;
    Ok(ColumnType::Decimal(DecimalSpec::new(precision, scale)?))
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ColumnType::String => serializer.serialize_str("String"),
            ColumnType::Integer => serializer.serialize_str("Integer"),
            ColumnType::Float => serializer.serialize_str("Float"),
            ColumnType::Boolean => serializer.serialize_str("Boolean"),
            ColumnType::Date => serializer.serialize_str("Date"),
            ColumnType::DateTime => serializer.serialize_str("DateTime"),
            ColumnType::Time => serializer.serialize_str("Time"),
            ColumnType::Guid => serializer.serialize_str("Guid"),
            ColumnType::Decimal(spec) => serializer.serialize_str(&spec.signature()),
        }
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub datatype: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, datatype: ColumnType) -> Self {
        Self {
            name: name.into(),
            datatype,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Cell text standing for null in a stored table's data file. Absent for
    /// plain CSV, where an empty cell is null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_token: Option<String>,
}

impl Schema {
    /// Builds a schema, rejecting empty and duplicate column names.
    pub fn new(columns: Vec<ColumnMeta>) -> Result<Self> {
        let schema = Schema {
            columns,
            schema_version: None,
            null_token: None,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            ensure!(!column.name.is_empty(), "Column names cannot be empty");
            ensure!(
                seen.insert(column.name.as_str()),
                "Duplicate column name '{}' in schema",
                column.name
            );
            if let ColumnType::Decimal(spec) = &column.datatype {
                spec.ensure_valid()
                    .with_context(|| format!("Column '{}'", column.name))?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn datatype(&self, name: &str) -> Option<&ColumnType> {
        self.column(name).map(|c| &c.datatype)
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn validate_headers(&self, headers: &[String]) -> Result<()> {
        if headers.len() != self.columns.len() {
            return Err(anyhow!(
                "Header length mismatch: schema expects {} column(s) but file contains {}",
                self.columns.len(),
                headers.len()
            ));
        }
        for (idx, (column, name)) in self.columns.iter().zip(headers).enumerate() {
            if column.name != *name {
                return Err(anyhow!(
                    "Header mismatch at position {}: expected '{}' but found '{}'",
                    idx + 1,
                    column.name,
                    name
                ));
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let schema: Schema =
            serde_yaml::from_reader(BufReader::new(file)).context("Parsing schema YAML")?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(BufWriter::new(file), &self.versioned())
            .context("Writing schema YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(&self.versioned()).context("Serializing schema to YAML string")
    }

    fn versioned(&self) -> Schema {
        let mut schema = self.clone();
        if schema.schema_version.is_none() {
            schema.schema_version = Some(CURRENT_SCHEMA_VERSION.to_string());
        }
        schema
    }

    /// Two schemas describe the same table shape when names, order and types agree.
    pub fn same_shape(&self, other: &Schema) -> bool {
        self.columns == other.columns
    }
}

/// Parses repeatable `name:type` definitions, each possibly comma separated.
pub fn parse_column_definitions(specs: &[String]) -> Result<Vec<ColumnMeta>> {
    let mut columns = Vec::new();
    let mut seen = HashSet::new();

    for raw in specs {
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (name, type_part) = token
                .split_once(':')
                .map(|(n, t)| (n.trim(), t.trim()))
                .ok_or_else(|| anyhow!("Column definition '{token}' must use the form name:type"))?;
            if name.is_empty() {
                return Err(anyhow!("Column name cannot be empty in definition '{token}'"));
            }
            if !seen.insert(name.to_string()) {
                return Err(anyhow!("Duplicate column name '{name}' provided"));
            }
            let datatype = ColumnType::from_str(type_part)
                .map_err(|err| anyhow!("Column '{name}' has invalid type '{type_part}': {err}"))?;
            columns.push(ColumnMeta::new(name, datatype));
        }
    }

    if columns.is_empty() {
        return Err(anyhow!("At least one column definition is required"));
    }
    Ok(columns)
}

/// Candidate types tried in order, narrowest first.
const INFERENCE_ORDER: &[ColumnType] = &[
    ColumnType::Boolean,
    ColumnType::Integer,
    ColumnType::Float,
    ColumnType::Date,
    ColumnType::DateTime,
    ColumnType::Time,
    ColumnType::Guid,
];

/// Picks the narrowest type every non-empty sample parses as.
pub fn infer_column_type<'a, I>(samples: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates: Vec<ColumnType> = INFERENCE_ORDER.to_vec();
    let mut observed = false;
    for sample in samples {
        if sample.trim().is_empty() {
            continue;
        }
        observed = true;
        candidates.retain(|ty| {
            // "1"/"0" parse as booleans; only accept word-like booleans.
            if *ty == ColumnType::Boolean && sample.trim().chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
            parse_typed_value(sample, ty).is_ok()
        });
        if candidates.is_empty() {
            break;
        }
    }
    if !observed {
        return ColumnType::String;
    }
    candidates.into_iter().next().unwrap_or(ColumnType::String)
}

/// Samples up to `sample_rows` rows (0 = all) of a CSV file and infers a schema.
pub fn infer_schema(
    path: &Path,
    sample_rows: usize,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Schema> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter, true)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let mut samples: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

    for (row_idx, record) in reader.byte_records().enumerate() {
        if sample_rows > 0 && row_idx >= sample_rows {
            break;
        }
        let record = record.with_context(|| format!("Reading row {} in {path:?}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)?;
        for (column, value) in samples.iter_mut().zip(decoded) {
            column.push(value);
        }
    }

    let columns = headers
        .into_iter()
        .zip(samples)
        .map(|(name, values)| {
            let datatype = infer_column_type(values.iter().map(String::as_str));
            ColumnMeta::new(name, datatype)
        })
        .collect();
    Schema::new(columns)
}
