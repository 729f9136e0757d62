use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use glam::Vec3;
use roxmltree::{Document, Node};
use serde_json::{Map, Value};

use crate::app::{validate_components, Component, ComponentError};

use super::assets::ModelInfo;
use super::database::{AssetCatalog, AssetDef, AssetDefId};

/// Component attributes that are always read as text, even when they look
/// like numbers or booleans.
const TEXT_ATTRIBUTES: &[&str] = &[
    "name",
    "prompt",
    "event",
    "shopId",
    "targetMap",
    "preset",
    "shape",
    "lightType",
    "attitude",
    "behavior",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    UnknownComponent,
    DuplicateComponent,
    DuplicateAssetDef,
}

#[derive(Debug, Clone)]
pub struct CatalogError {
    pub code: CatalogErrorCode,
    pub message: String,
    pub source_name: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code, self.message, self.source_name, loc.line, loc.column
            ),
            None => write!(f, "{:?}: {} (file={})", self.code, self.message, self.source_name),
        }
    }
}

impl std::error::Error for CatalogError {}

pub fn load_catalog_from_path(path: &Path) -> Result<AssetCatalog, CatalogError> {
    let source_name = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|error| CatalogError {
        code: CatalogErrorCode::ReadFile,
        message: format!("failed to read catalog: {error}"),
        source_name: source_name.clone(),
        location: None,
    })?;
    parse_catalog(&source_name, &raw)
}

/// Parses an `<AssetDefs>` document. Asset ids must be unique within it.
pub fn parse_catalog(source_name: &str, raw: &str) -> Result<AssetCatalog, CatalogError> {
    let doc = Document::parse(raw).map_err(|error| CatalogError {
        code: CatalogErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        source_name: source_name.to_string(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let ctx = ParseContext {
        source_name,
        doc: &doc,
    };
    let root = doc.root_element();
    if root.tag_name().name() != "AssetDefs" {
        return Err(ctx.error_at(
            CatalogErrorCode::InvalidRoot,
            "root element must be <AssetDefs>".to_string(),
            root,
        ));
    }

    let mut seen_ids = HashSet::<String>::new();
    let mut defs = Vec::<AssetDef>::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "AssetDef" {
            return Err(ctx.error_at(
                CatalogErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; expected <AssetDef>",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        let def = ctx.parse_asset_def(child)?;
        if !seen_ids.insert(def.asset_id.clone()) {
            return Err(ctx.error_at(
                CatalogErrorCode::DuplicateAssetDef,
                format!("duplicate AssetDef '{}'", def.asset_id),
                child,
            ));
        }
        defs.push(def);
    }

    Ok(AssetCatalog::from_asset_defs(defs))
}

struct ParseContext<'a, 'input> {
    source_name: &'a str,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn parse_asset_def(&self, node: Node<'_, '_>) -> Result<AssetDef, CatalogError> {
        let mut seen_fields = HashSet::<String>::new();
        let mut asset_id: Option<String> = None;
        let mut label: Option<String> = None;
        let mut model: Option<ModelInfo> = None;
        let mut components = Vec::<Component>::new();

        for field in node.children().filter(|child| child.is_element()) {
            let field_name = field.tag_name().name().to_string();
            if !seen_fields.insert(field_name.clone()) {
                return Err(self.error_at(
                    CatalogErrorCode::DuplicateField,
                    format!("duplicate field <{}> in <AssetDef>", field_name),
                    field,
                ));
            }

            match field_name.as_str() {
                "assetId" => asset_id = Some(self.required_text(field, "assetId")?),
                "label" => label = Some(self.required_text(field, "label")?),
                "model" => model = Some(self.parse_model(field)?),
                "components" => components = self.parse_components(field)?,
                _ => {
                    return Err(self.error_at(
                        CatalogErrorCode::UnknownField,
                        format!("unknown field <{}> in <AssetDef>", field_name),
                        field,
                    ))
                }
            }
        }

        let Some(asset_id) = asset_id else {
            return Err(self.error_at(
                CatalogErrorCode::MissingField,
                "missing required field <assetId> in <AssetDef>".to_string(),
                node,
            ));
        };
        let label = label.unwrap_or_else(|| asset_id.clone());

        Ok(AssetDef {
            id: AssetDefId(0),
            asset_id,
            label,
            model,
            components,
        })
    }

    fn parse_model(&self, node: Node<'_, '_>) -> Result<ModelInfo, CatalogError> {
        let mut bounds: Option<Vec3> = None;
        let mut animation_clips = Vec::<String>::new();
        for attribute in node.attributes() {
            match attribute.name() {
                "bounds" => {
                    let parsed = parse_vec3(attribute.value())
                        .filter(|size| size.cmpgt(Vec3::ZERO).all())
                        .ok_or_else(|| {
                            self.error_at(
                                CatalogErrorCode::InvalidValue,
                                format!(
                                    "model bounds '{}' must be three positive numbers",
                                    attribute.value()
                                ),
                                node,
                            )
                        })?;
                    bounds = Some(parsed);
                }
                "clips" => {
                    animation_clips = attribute
                        .value()
                        .split(',')
                        .map(str::trim)
                        .filter(|clip| !clip.is_empty())
                        .map(ToString::to_string)
                        .collect();
                }
                other => {
                    return Err(self.error_at(
                        CatalogErrorCode::UnknownField,
                        format!("unknown attribute '{}' on <model>", other),
                        node,
                    ))
                }
            }
        }

        let Some(bounds) = bounds else {
            return Err(self.error_at(
                CatalogErrorCode::MissingField,
                "<model> requires a 'bounds' attribute".to_string(),
                node,
            ));
        };
        Ok(ModelInfo {
            bounds,
            animation_clips,
        })
    }

    fn parse_components(&self, node: Node<'_, '_>) -> Result<Vec<Component>, CatalogError> {
        let mut components = Vec::<Component>::new();
        for element in node.children().filter(|child| child.is_element()) {
            let type_name = element.tag_name().name();
            let mut record = Map::new();
            record.insert("type".to_string(), Value::String(type_name.to_string()));
            for attribute in element.attributes() {
                record.insert(
                    attribute.name().to_string(),
                    attribute_value(attribute.name(), attribute.value()),
                );
            }
            let component = Component::from_json(Value::Object(record))
                .map_err(|error| self.component_error(error, element))?;
            components.push(component);
            validate_components(&components)
                .map_err(|error| self.component_error(error, element))?;
        }
        Ok(components)
    }

    fn component_error(&self, error: ComponentError, node: Node<'_, '_>) -> CatalogError {
        let code = match error {
            ComponentError::UnknownType { .. } => CatalogErrorCode::UnknownComponent,
            ComponentError::DuplicateSingleton { .. } => CatalogErrorCode::DuplicateComponent,
            ComponentError::Malformed { .. } => CatalogErrorCode::InvalidValue,
        };
        self.error_at(code, error.to_string(), node)
    }

    fn required_text(&self, node: Node<'_, '_>, field_name: &str) -> Result<String, CatalogError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                CatalogErrorCode::MissingField,
                format!("field <{}> must not be empty", field_name),
                node,
            ));
        }
        Ok(value)
    }

    fn error_at(&self, code: CatalogErrorCode, message: String, node: Node<'_, '_>) -> CatalogError {
        let pos = self.doc.text_pos_at(node.range().start);
        CatalogError {
            code,
            message,
            source_name: self.source_name.to_string(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }
}

fn attribute_value(name: &str, raw: &str) -> Value {
    if TEXT_ATTRIBUTES.contains(&name) {
        return Value::String(raw.to_string());
    }
    let trimmed = raw.trim();
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if float.is_finite() {
            return Value::from(float);
        }
    }
    let parts = trimmed
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>();
    match parts {
        Ok(numbers) if numbers.len() > 1 && numbers.iter().all(|n| n.is_finite()) => {
            Value::Array(numbers.into_iter().map(Value::from).collect())
        }
        _ => Value::String(raw.to_string()),
    }
}

fn parse_vec3(raw: &str) -> Option<Vec3> {
    let parts = raw
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    match parts.as_slice() {
        [x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => Some(Vec3::new(*x, *y, *z)),
        _ => None,
    }
}
