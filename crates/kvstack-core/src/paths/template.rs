//! Regex-backed path templates.
//!
//! A template such as `"/data/{user}/{year}/{name}.json"` describes a family
//! of paths. Literal text matches itself, each `{field}` (or positional `{}`)
//! slot matches one path segment (`[^/]+`) unless given its own pattern.
//! `{{` and `}}` stand for literal braces.
//!
//! On the paths a template accepts, [`PathTemplate::parse`] and
//! [`PathTemplate::format`] are inverse to each other.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::error::{StoreError, StoreResult};
use crate::hooks::KeyMap;

/// Default pattern of a slot: one path segment.
pub const DEFAULT_FIELD_PATTERN: &str = "[^/]+";

/// Errors building a template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),

    #[error("field {0:?} appears twice")]
    DuplicateField(String),

    #[error("no field named {0:?}")]
    UnknownField(String),

    #[error("template has {0} fields, expected exactly one")]
    NotSingleField(usize),

    #[error("invalid field pattern: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Clone, Debug)]
enum Segment {
    Literal(String),
    Field(usize),
}

#[derive(Clone, Debug)]
struct Field {
    /// `None` for positional slots.
    name: Option<String>,
    pattern: String,
    check: Regex,
}

/// A parsed path template.
#[derive(Clone)]
pub struct PathTemplate {
    template: String,
    segments: Vec<Segment>,
    fields: Vec<Field>,
    regex: Regex,
}

impl PathTemplate {
    pub fn new(template: &str) -> Result<Self, TemplateError> {
        let (segments, names) = split_template(template)?;
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            if let Some(n) = &name {
                if fields.iter().any(|f: &Field| f.name.as_deref() == Some(n.as_str())) {
                    return Err(TemplateError::DuplicateField(n.clone()));
                }
            }
            fields.push(Field {
                name,
                pattern: DEFAULT_FIELD_PATTERN.to_string(),
                check: anchored(DEFAULT_FIELD_PATTERN)?,
            });
        }
        let regex = build_regex(&segments, &fields)?;
        Ok(Self {
            template: template.to_string(),
            segments,
            fields,
            regex,
        })
    }

    /// Give the field `name` its own regex, e.g. `"[0-9]{4}"` for a year.
    pub fn with_field_pattern(mut self, name: &str, pattern: &str) -> Result<Self, TemplateError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name.as_deref() == Some(name))
            .ok_or_else(|| TemplateError::UnknownField(name.to_string()))?;
        field.pattern = pattern.to_string();
        field.check = anchored(pattern)?;
        self.regex = build_regex(&self.segments, &self.fields)?;
        Ok(self)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// The full-match regex paths are validated against.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Field names in slot order; positional slots are named by index.
    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| f.name.clone().unwrap_or_else(|| i.to_string()))
            .collect()
    }

    pub fn is_valid(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Field values of `path`, in slot order.
    pub fn parse(&self, path: &str) -> StoreResult<Vec<String>> {
        let caps = self.regex.captures(path).ok_or_else(|| {
            StoreError::key_not_valid(&path, format!("does not match template {:?}", self.template))
        })?;
        Ok((0..self.fields.len())
            .map(|i| {
                caps.name(&group_name(i))
                    .map_or_else(String::new, |m| m.as_str().to_string())
            })
            .collect())
    }

    /// Field values of `path`, by field name.
    pub fn parse_named(&self, path: &str) -> StoreResult<BTreeMap<String, String>> {
        Ok(self.field_names().into_iter().zip(self.parse(path)?).collect())
    }

    /// Fill the slots with `values`, in slot order.
    ///
    /// Fails with `KeyNotValid` if the count is wrong or a value does not
    /// match its slot pattern, or if the filled path would parse back to
    /// different values.
    pub fn format<V: AsRef<str>>(&self, values: &[V]) -> StoreResult<String> {
        if values.len() != self.fields.len() {
            return Err(StoreError::key_not_valid(
                &values.iter().map(|v| v.as_ref()).collect::<Vec<&str>>(),
                format!(
                    "template {:?} has {} fields, got {}",
                    self.template,
                    self.fields.len(),
                    values.len()
                ),
            ));
        }
        for (field, value) in self.fields.iter().zip(values) {
            if !field.check.is_match(value.as_ref()) {
                return Err(StoreError::key_not_valid(
                    &value.as_ref(),
                    format!("does not match field pattern {:?}", field.pattern),
                ));
            }
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(i) => out.push_str(values[*i].as_ref()),
            }
        }

        // Adjacent slots can swallow each other's text; only paths that
        // parse back to the same values are keys.
        let parsed = self.parse(&out)?;
        if !parsed.iter().map(String::as_str).eq(values.iter().map(AsRef::as_ref)) {
            return Err(StoreError::key_not_valid(
                &out,
                format!("ambiguous in template {:?}, parses as {parsed:?}", self.template),
            ));
        }
        Ok(out)
    }

    /// Fill the slots by field name. Extra entries are ignored.
    pub fn format_named(&self, values: &BTreeMap<String, String>) -> StoreResult<String> {
        let mut ordered = Vec::with_capacity(self.fields.len());
        for name in self.field_names() {
            let value = values.get(&name).ok_or_else(|| {
                StoreError::key_not_valid(values, format!("missing field {name:?}"))
            })?;
            ordered.push(value.as_str());
        }
        self.format(&ordered)
    }

    /// Field tuples to paths and back.
    pub fn tuple_keys(&self) -> KeyMap<Vec<String>, String> {
        let fmt = self.clone();
        let parse = self.clone();
        KeyMap::new(
            move |values: &Vec<String>| fmt.format(values),
            move |path: &String| parse.parse(path),
        )
    }

    /// Field maps to paths and back.
    pub fn named_keys(&self) -> KeyMap<BTreeMap<String, String>, String> {
        let fmt = self.clone();
        let parse = self.clone();
        KeyMap::new(
            move |values: &BTreeMap<String, String>| fmt.format_named(values),
            move |path: &String| parse.parse_named(path),
        )
    }

    /// Bare field values to paths and back, for one-slot templates.
    pub fn single_field_keys(&self) -> Result<KeyMap<String, String>, TemplateError> {
        if self.fields.len() != 1 {
            return Err(TemplateError::NotSingleField(self.fields.len()));
        }
        let fmt = self.clone();
        let parse = self.clone();
        Ok(KeyMap::new(
            move |value: &String| fmt.format(&[value]),
            move |path: &String| {
                parse
                    .parse(path)?
                    .pop()
                    .ok_or_else(|| StoreError::key_not_valid(path, "no field value"))
            },
        ))
    }
}

impl fmt::Debug for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathTemplate")
            .field("template", &self.template)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

fn group_name(index: usize) -> String {
    format!("f{index}")
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

fn build_regex(segments: &[Segment], fields: &[Field]) -> Result<Regex, regex::Error> {
    let mut re = String::from("^");
    for segment in segments {
        match segment {
            Segment::Literal(text) => re.push_str(&regex::escape(text)),
            Segment::Field(i) => {
                re.push_str(&format!("(?P<{}>(?:{}))", group_name(*i), fields[*i].pattern));
            }
        }
    }
    re.push('$');
    Regex::new(&re)
}

/// Split a template into literal and slot segments.
fn split_template(template: &str) -> Result<(Vec<Segment>, Vec<Option<String>>), TemplateError> {
    let mut segments = Vec::new();
    let mut names = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((at, '{')) => return Err(TemplateError::UnbalancedBrace(at)),
                        Some((_, ch)) => name.push(ch),
                        None => return Err(TemplateError::UnbalancedBrace(pos)),
                    }
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(names.len()));
                names.push(if name.is_empty() { None } else { Some(name) });
            }
            '}' => return Err(TemplateError::UnbalancedBrace(pos)),
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok((segments, names))
}
