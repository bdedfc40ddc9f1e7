//! Structured-data engine: CSV, JSON, TOML, YAML, INI, XML, NDJSON and
//! XLSX output.
//!
//! Every supported pair is an entry in a `(from, to)` table, so support for a
//! pair can be queried without running a conversion.

use crate::types::{ConversionError, EngineCategory};
use ini::Ini;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use rust_xlsxwriter::Workbook;
use serde_json::{Map, Value};
use std::collections::HashMap;

type TextConversion = fn(&str) -> Result<Vec<u8>, ConversionError>;

static CONVERSIONS: Lazy<HashMap<(&'static str, &'static str), TextConversion>> = Lazy::new(|| {
    let entries: [((&'static str, &'static str), TextConversion); 13] = [
        (("csv", "json"), csv_to_json),
        (("csv", "xlsx"), csv_to_xlsx),
        (("json", "csv"), json_to_csv),
        (("json", "toml"), json_to_toml),
        (("toml", "json"), toml_to_json),
        (("yaml", "json"), yaml_to_json),
        (("json", "yaml"), json_to_yaml),
        (("ini", "json"), ini_to_json),
        (("json", "ini"), json_to_ini),
        (("xml", "json"), xml_to_json),
        (("json", "xml"), json_to_xml),
        (("ndjson", "json"), ndjson_to_json),
        (("json", "ndjson"), json_to_ndjson),
    ];
    entries.into_iter().collect()
});

pub struct TextProcessor;

impl TextProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(&self, from: &str, to: &str) -> bool {
        CONVERSIONS.contains_key(&(from, to))
    }

    pub fn convert(&self, content: &[u8], from: &str, to: &str) -> Result<Vec<u8>, ConversionError> {
        let conversion = CONVERSIONS
            .get(&(from, to))
            .ok_or_else(|| ConversionError::UnsupportedConversion {
                category: EngineCategory::StructuredData,
                from: from.to_string(),
                to: to.to_string(),
            })?;

        let text = String::from_utf8_lossy(content);
        log::debug!("Structured conversion {} -> {} ({} bytes)", from, to, content.len());
        conversion(&text)
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn pretty_json(value: &Value) -> Result<Vec<u8>, ConversionError> {
    Ok(serde_json::to_vec_pretty(value)?)
}

/// Text of a JSON value as it should appear in a flat cell.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// === CSV ===

fn csv_to_json(text: &str) -> Result<Vec<u8>, ConversionError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        // Short rows leave trailing fields absent; wide rows drop the overflow.
        let record: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(key, cell)| (key.to_string(), Value::String(cell.to_string())))
            .collect();
        records.push(Value::Object(record));
    }

    pretty_json(&Value::Array(records))
}

fn csv_to_xlsx(text: &str) -> Result<Vec<u8>, ConversionError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (row_index, record) in reader.records().enumerate() {
        let record = record?;
        let row = u32::try_from(row_index)
            .map_err(|_| ConversionError::shape("CSV has too many rows for a worksheet"))?;

        for (col_index, cell) in record.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let col = u16::try_from(col_index)
                .map_err(|_| ConversionError::shape("CSV has too many columns for a worksheet"))?;

            match cell.parse::<f64>() {
                Ok(number) if number.is_finite() => {
                    worksheet.write_number(row, col, number)?;
                }
                _ => {
                    worksheet.write_string(row, col, cell)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn json_to_csv(text: &str) -> Result<Vec<u8>, ConversionError> {
    let value: Value = serde_json::from_str(text)?;
    let rows = value
        .as_array()
        .ok_or_else(|| ConversionError::shape("JSON input must be an array of objects to convert to CSV"))?;

    let mut objects = Vec::with_capacity(rows.len());
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        let object = row
            .as_object()
            .ok_or_else(|| ConversionError::shape("JSON input must be an array of objects to convert to CSV"))?;
        for key in object.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
        objects.push(object);
    }

    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;
    for object in objects {
        writer.write_record(
            columns
                .iter()
                .map(|column| object.get(*column).map(scalar_text).unwrap_or_default()),
        )?;
    }

    writer
        .into_inner()
        .map_err(|e| ConversionError::Io(e.into_error()))
}

// === TOML / YAML ===

fn json_to_toml(text: &str) -> Result<Vec<u8>, ConversionError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(ConversionError::shape("JSON input must be an object to convert to TOML"));
    }

    let table = toml::Value::try_from(&value)?;
    Ok(toml::to_string(&table)?.into_bytes())
}

fn toml_to_json(text: &str) -> Result<Vec<u8>, ConversionError> {
    let table: toml::Table = toml::from_str(text)?;
    pretty_json(&toml_value_to_json(toml::Value::Table(table)))
}

fn toml_value_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(text) => Value::String(text),
        toml::Value::Integer(number) => Value::from(number),
        toml::Value::Float(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(flag) => Value::Bool(flag),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_value_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_value_to_json(value)))
                .collect(),
        ),
    }
}

fn yaml_to_json(text: &str) -> Result<Vec<u8>, ConversionError> {
    let mut document: serde_yaml::Value = serde_yaml::from_str(text)?;
    document.apply_merge()?;
    pretty_json(&yaml_value_to_json(document))
}

fn yaml_value_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(flag) => Value::Bool(flag),
        serde_yaml::Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Value::from(int)
            } else if let Some(int) = number.as_u64() {
                Value::from(int)
            } else {
                number
                    .as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(text) => Value::String(text),
        serde_yaml::Value::Sequence(items) => Value::Array(items.into_iter().map(yaml_value_to_json).collect()),
        serde_yaml::Value::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(key, value)| (yaml_key_text(key), yaml_value_to_json(value)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_value_to_json(tagged.value),
    }
}

/// Object key for a YAML mapping key; non-string keys use their scalar text.
fn yaml_key_text(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(text) => text,
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(flag) => flag.to_string(),
        serde_yaml::Value::Number(number) => number.to_string(),
        other => serde_json::to_string(&yaml_value_to_json(other)).unwrap_or_default(),
    }
}

fn json_to_yaml(text: &str) -> Result<Vec<u8>, ConversionError> {
    let value: Value = serde_json::from_str(text)?;
    Ok(serde_yaml::to_string(&value)?.into_bytes())
}

// === INI ===

fn ini_to_json(text: &str) -> Result<Vec<u8>, ConversionError> {
    let ini = Ini::load_from_str(text)?;
    let mut root = Map::new();

    for (section, properties) in ini.iter() {
        let target = match section {
            Some(name) => section_object(&mut root, name)?,
            None => &mut root,
        };
        for (key, raw) in properties.iter() {
            insert_ini_value(target, key, raw);
        }
    }

    pretty_json(&Value::Object(root))
}

/// Object for a (possibly dotted) section name, created on demand.
fn section_object<'a>(
    root: &'a mut Map<String, Value>,
    name: &str,
) -> Result<&'a mut Map<String, Value>, ConversionError> {
    let mut current = root;
    for part in name.split('.') {
        current = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| {
                ConversionError::shape(format!("INI section [{}] conflicts with an existing key", name))
            })?;
    }
    Ok(current)
}

fn insert_ini_value(target: &mut Map<String, Value>, key: &str, raw: &str) {
    let value = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    };

    match key.strip_suffix("[]") {
        Some(array_key) => {
            let slot = target
                .entry(array_key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => items.push(value),
                other => {
                    let previous = other.take();
                    *other = Value::Array(vec![previous, value]);
                }
            }
        }
        None => {
            target.insert(key.to_string(), value);
        }
    }
}

fn json_to_ini(text: &str) -> Result<Vec<u8>, ConversionError> {
    let value: Value = serde_json::from_str(text)?;
    let root = value
        .as_object()
        .ok_or_else(|| ConversionError::shape("JSON input must be an object to convert to INI"))?;

    let mut ini = Ini::new();
    write_ini_section(&mut ini, None, root);

    let mut output = Vec::new();
    ini.write_to(&mut output)?;
    Ok(output)
}

fn write_ini_section(ini: &mut Ini, section: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        match value {
            Value::Object(_) => {}
            Value::Array(items) => {
                for item in items {
                    ini.with_section(section).add(format!("{}[]", key), scalar_text(item));
                }
            }
            scalar => {
                ini.with_section(section).set(key.as_str(), scalar_text(scalar));
            }
        }
    }

    for (key, value) in map {
        if let Value::Object(child) = value {
            let name = match section {
                Some(parent) => format!("{}.{}", parent, key),
                None => key.clone(),
            };
            write_ini_section(ini, Some(&name), child);
        }
    }
}

// === XML (compact mapping) ===

fn xml_to_json(text: &str) -> Result<Vec<u8>, ConversionError> {
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<(String, Map<String, Value>)> = vec![(String::new(), Map::new())];

    loop {
        match reader.read_event()? {
            Event::Decl(decl) => {
                let mut attributes = Map::new();
                attributes.insert(
                    "version".to_string(),
                    Value::String(String::from_utf8_lossy(&decl.version()?).into_owned()),
                );
                if let Some(encoding) = decl.encoding() {
                    attributes.insert(
                        "encoding".to_string(),
                        Value::String(String::from_utf8_lossy(&encoding?).into_owned()),
                    );
                }
                if let Some(standalone) = decl.standalone() {
                    attributes.insert(
                        "standalone".to_string(),
                        Value::String(String::from_utf8_lossy(&standalone?).into_owned()),
                    );
                }
                let mut declaration = Map::new();
                declaration.insert("_attributes".to_string(), Value::Object(attributes));
                append_child(innermost(&mut stack)?, "_declaration", Value::Object(declaration));
            }
            Event::Start(start) => {
                let (name, element) = open_element(&start)?;
                stack.push((name, element));
            }
            Event::Empty(start) => {
                let (name, element) = open_element(&start)?;
                append_child(innermost(&mut stack)?, &name, Value::Object(element));
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(ConversionError::shape("XML has an unexpected closing tag"));
                }
                if let Some((name, element)) = stack.pop() {
                    append_child(innermost(&mut stack)?, &name, Value::Object(element));
                }
            }
            Event::Text(content) => {
                let content = content.unescape()?.into_owned();
                if content.trim().is_empty() {
                    continue;
                }
                append_child(innermost(&mut stack)?, "_text", Value::String(content));
            }
            Event::CData(cdata) => {
                let content = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                append_child(innermost(&mut stack)?, "_cdata", Value::String(content));
            }
            Event::Comment(comment) => {
                let content = String::from_utf8_lossy(&comment).into_owned();
                append_child(innermost(&mut stack)?, "_comment", Value::String(content));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(ConversionError::shape("XML document has unclosed elements"));
    }
    let root = stack.pop().map(|(_, root)| root).unwrap_or_default();
    pretty_json(&Value::Object(root))
}

fn innermost(
    stack: &mut [(String, Map<String, Value>)],
) -> Result<&mut Map<String, Value>, ConversionError> {
    stack
        .last_mut()
        .map(|(_, element)| element)
        .ok_or_else(|| ConversionError::shape("XML nesting is malformed"))
}

fn open_element(start: &BytesStart<'_>) -> Result<(String, Map<String, Value>), ConversionError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attributes = Map::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        attributes.insert(key, Value::String(value));
    }

    let mut element = Map::new();
    if !attributes.is_empty() {
        element.insert("_attributes".to_string(), Value::Object(attributes));
    }
    Ok((name, element))
}

/// Repeated keys turn into arrays, in document order.
fn append_child(parent: &mut Map<String, Value>, key: &str, value: Value) {
    match parent.get_mut(key) {
        None => {
            parent.insert(key.to_string(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, value]);
        }
    }
}

fn json_to_xml(text: &str) -> Result<Vec<u8>, ConversionError> {
    let value: Value = serde_json::from_str(text)?;
    let root = value
        .as_object()
        .ok_or_else(|| ConversionError::shape("JSON input must be an object to convert to XML"))?;

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_xml_children(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_xml_children(writer: &mut Writer<Vec<u8>>, map: &Map<String, Value>) -> Result<(), ConversionError> {
    for (key, value) in map {
        let items = match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            single => vec![single],
        };

        match key.as_str() {
            "_attributes" => {}
            "_declaration" => write_xml_declaration(writer, value)?,
            "_text" => {
                for item in items {
                    writer.write_event(Event::Text(BytesText::new(&scalar_text(item))))?;
                }
            }
            "_cdata" => {
                for item in items {
                    writer.write_event(Event::CData(BytesCData::new(scalar_text(item))))?;
                }
            }
            "_comment" => {
                for item in items {
                    writer.write_event(Event::Comment(BytesText::new(&scalar_text(item))))?;
                }
            }
            name => {
                for item in items {
                    write_xml_element(writer, name, item)?;
                }
            }
        }
    }
    Ok(())
}

fn write_xml_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), ConversionError> {
    let mut start = BytesStart::new(name);

    match value {
        Value::Object(map) => {
            if let Some(Value::Object(attributes)) = map.get("_attributes") {
                for (key, attribute) in attributes {
                    start.push_attribute((key.as_str(), scalar_text(attribute).as_str()));
                }
            }
            writer.write_event(Event::Start(start))?;
            if map.keys().all(|key| key == "_attributes") {
                // keeps the end tag on the same line as the start tag
                writer.write_event(Event::Text(BytesText::new("")))?;
            } else {
                write_xml_children(writer, map)?;
            }
        }
        scalar => {
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(&scalar_text(scalar))))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_xml_declaration(writer: &mut Writer<Vec<u8>>, value: &Value) -> Result<(), ConversionError> {
    let attributes = value.get("_attributes");
    let attribute = |key: &str| {
        attributes
            .and_then(|attributes| attributes.get(key))
            .map(scalar_text)
    };

    let version = attribute("version").unwrap_or_else(|| "1.0".to_string());
    let encoding = attribute("encoding");
    let standalone = attribute("standalone");

    writer.write_event(Event::Decl(BytesDecl::new(
        &version,
        encoding.as_deref(),
        standalone.as_deref(),
    )))?;
    Ok(())
}

// === NDJSON ===

fn ndjson_to_json(text: &str) -> Result<Vec<u8>, ConversionError> {
    let records = text
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str::<Value>)
        .collect::<Result<Vec<_>, _>>()?;

    pretty_json(&Value::Array(records))
}

fn json_to_ndjson(text: &str) -> Result<Vec<u8>, ConversionError> {
    let value: Value = serde_json::from_str(text)?;
    let records = value
        .as_array()
        .ok_or_else(|| ConversionError::shape("JSON input must be an array to convert to NDJSON"))?;

    let lines = records
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n").into_bytes())
}
