//! value representation
//!
//! Nothing is ever evaluated. A value is either a literal that can be read straight from the
//! syntax tree or an [Value::Expression] carrying the verbatim source text.
//!
//! Literals:
//! - null (`nil`)
//! - boolean (true/false)
//! - integer (i64, ruby radix prefixes and a leading `0` for octal are honored)
//! - decimal (f64)
//! - string (only when free of interpolation)
//! - symbol (`:name`, serialized as the string `":name"`)
//! - array (elements may be expressions)
//! - object (order-preserving, keys must be literal, values may be expressions)
//!
//! Expressions serialize as `{"expr": "<source>"}` so they can never be mistaken for strings.
use crate::util::{NodeExt, SourceFile};
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};
use tree_sitter::Node;

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Symbol(String),
    Array(Vec<Value>),
    Object(indexmap::IndexMap<String, Value>),
    Expression(String),
}

impl Value {
    pub fn is_literal(&self) -> bool {
        !matches!(self, Value::Expression(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// String or symbol content, the two ways ruby spells a name
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn from_node(file: &SourceFile, node: Node) -> Value {
        let expression = || Value::Expression(file.text(node).to_string());

        match node.kind() {
            "nil" => Value::Null,
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            "integer" => parse_integer(file.text(node))
                .map(Value::Integer)
                .unwrap_or_else(expression),
            "float" => file
                .text(node)
                .replace('_', "")
                .parse::<f64>()
                .ok()
                .filter(|float| float.is_finite())
                .map(Value::Decimal)
                .unwrap_or_else(expression),
            "string" | "bare_string" => string_content(file, node)
                .map(Value::String)
                .unwrap_or_else(expression),
            "simple_symbol" => Value::Symbol(file.text(node).trim_start_matches(':').to_string()),
            "bare_symbol" => string_content(file, node)
                .map(Value::Symbol)
                .unwrap_or_else(expression),
            "array" | "string_array" | "symbol_array" => Value::Array(
                node.named()
                    .into_iter()
                    .map(|element| Value::from_node(file, element))
                    .collect(),
            ),
            "hash" => object_from_pairs(file, &node.named())
                .map(Value::Object)
                .unwrap_or_else(expression),
            "unary" => negative_number(file, node).unwrap_or_else(expression),
            _ => expression(),
        }
    }

    /// Arguments of a call as one value
    ///
    /// A single argument is its own value, several become an array and trailing `key: value`
    /// arguments are grouped into one object (as ruby does).
    pub(crate) fn from_arguments(file: &SourceFile, arguments: &[Node]) -> Value {
        let (Some(first), Some(last)) = (arguments.first(), arguments.last()) else {
            return Value::Null;
        };

        let pairs: Vec<_> = arguments
            .iter()
            .copied()
            .filter(|arg| arg.kind() == "pair")
            .collect();
        let mut values: Vec<_> = arguments
            .iter()
            .filter(|arg| arg.kind() != "pair")
            .map(|arg| Value::from_node(file, *arg))
            .collect();

        if !pairs.is_empty() {
            let Some(object) = object_from_pairs(file, &pairs) else {
                return Value::Expression(file.text_between(*first, *last).to_string());
            };
            values.push(Value::Object(object));
        }

        match values.len() {
            1 => values.remove(0),
            _ => Value::Array(values),
        }
    }

    /// Literal key of a hash pair (`key:`, `:key =>`, `'key' =>`)
    pub(crate) fn key_of(file: &SourceFile, node: Node) -> Option<String> {
        match node.kind() {
            "hash_key_symbol" | "identifier" | "constant" => Some(file.text(node).to_string()),
            "integer" => Some(file.text(node).to_string()),
            _ => Value::from_node(file, node).as_name().map(str::to_string),
        }
    }
}

/// `None` when a key is not literal or the list holds something other than pairs
fn object_from_pairs(
    file: &SourceFile,
    pairs: &[Node],
) -> Option<indexmap::IndexMap<String, Value>> {
    let mut object = indexmap::IndexMap::new();
    for pair in pairs {
        if pair.kind() != "pair" {
            return None;
        }

        let key_node = pair.child_by_field_name("key")?;
        let key = Value::key_of(file, key_node)?;
        // `{ name: }` shorthand refers to a local
        let value = match pair.child_by_field_name("value") {
            Some(value) => Value::from_node(file, value),
            None => Value::Expression(key.clone()),
        };
        object.insert(key, value);
    }
    Some(object)
}

/// String content when the string is free of interpolation and every escape decodes
fn string_content(file: &SourceFile, node: Node) -> Option<String> {
    let mut content = String::new();
    for part in node.named() {
        match part.kind() {
            "string_content" => content.push_str(file.text(part)),
            "escape_sequence" => unescape(file.text(part), &mut content)?,
            _ => return None,
        }
    }
    Some(content)
}

/// Decode one escape sequence into `out`, `None` for sequences like `\M-a` or `\cx`
fn unescape(sequence: &str, out: &mut String) -> Option<()> {
    let body = sequence.strip_prefix('\\')?;
    let mut chars = body.chars();
    let first = chars.next()?;
    let rest = chars.as_str();

    let decoded = match (first, rest) {
        ('n', "") => '\n',
        ('t', "") => '\t',
        ('r', "") => '\r',
        ('s', "") => ' ',
        ('e', "") => '\u{1b}',
        ('a', "") => '\u{7}',
        ('b', "") => '\u{8}',
        ('f', "") => '\u{c}',
        ('v', "") => '\u{b}',
        ('u', codes) => {
            // `\u{e9 41}` holds several code points
            match codes.strip_prefix('{').and_then(|c| c.strip_suffix('}')) {
                Some(list) => {
                    for code in list.split_whitespace() {
                        out.push(code_point(code, 16)?);
                    }
                    return Some(());
                }
                None if codes.len() == 4 => code_point(codes, 16)?,
                None => return None,
            }
        }
        ('x', hex) if (1..=2).contains(&hex.len()) => code_point(hex, 16)?,
        ('0'..='7', _) if rest.len() <= 2 => code_point(body, 8)?,
        (punctuation, "") if !punctuation.is_ascii_alphanumeric() => punctuation,
        _ => return None,
    };
    out.push(decoded);
    Some(())
}

fn code_point(digits: &str, radix: u32) -> Option<char> {
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
}

fn parse_integer(text: &str) -> Option<i64> {
    let digits = text.replace('_', "");
    let lower = digits.to_ascii_lowercase();

    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0d") {
        (10, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    i64::from_str_radix(digits, radix).ok()
}

fn negative_number(file: &SourceFile, node: Node) -> Option<Value> {
    let operator = node.child_by_field_name("operator")?;
    let operand = node.child_by_field_name("operand")?;
    if file.text(operator) != "-" {
        return None;
    }

    match Value::from_node(file, operand) {
        Value::Integer(int) => Some(Value::Integer(-int)),
        Value::Decimal(dec) => Some(Value::Decimal(-dec)),
        _ => None,
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<indexmap::IndexMap<K, V>> for Value {
    fn from(value: indexmap::IndexMap<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Symbol(value) => serializer.serialize_str(&format!(":{value}")),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Expression(source) => {
                let mut ser = serializer.serialize_map(Some(1))?;
                ser.serialize_entry("expr", source)?;
                ser.end()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::test::{recipe_file, ruby};
    use pretty_assertions::assert_eq;

    /// Value of the right-hand side of `value = <expr>`
    fn value_of(expr: &str) -> Value {
        let tree = ruby(&format!("value = {expr}\n"));
        let file = recipe_file(&tree);
        let assignment = tree.root().named()[0];
        Value::from_node(&file, assignment.child_by_field_name("right").unwrap())
    }

    #[test]
    fn scalars() {
        assert_eq!(value_of("'nginx'"), Value::from("nginx"));
        assert_eq!(value_of("\"a\\tb\""), Value::from("a\tb"));
        assert_eq!(value_of("''"), Value::from(""));
        assert_eq!(value_of("42"), Value::Integer(42));
        assert_eq!(value_of("1_000"), Value::Integer(1000));
        assert_eq!(value_of("0755"), Value::Integer(0o755));
        assert_eq!(value_of("0x1F"), Value::Integer(31));
        assert_eq!(value_of("-3"), Value::Integer(-3));
        assert_eq!(value_of("2.5"), Value::Decimal(2.5));
        assert_eq!(value_of("1e400"), Value::Expression("1e400".into()));
        assert_eq!(value_of("true"), Value::Boolean(true));
        assert_eq!(value_of("nil"), Value::Null);
        assert_eq!(value_of(":start"), Value::Symbol("start".into()));
    }

    #[test]
    fn escapes() {
        assert_eq!(value_of(r#""caf\u00e9\x41""#), Value::from("caf\u{e9}A"));
        assert_eq!(value_of(r#""\u{48 49}""#), Value::from("HI"));
        assert_eq!(value_of(r#""\101\0""#), Value::from("A\0"));
        assert_eq!(value_of(r#""say \"hi\"\\""#), Value::from("say \"hi\"\\"));
        assert_eq!(
            value_of(r#""\M-a""#),
            Value::Expression(r#""\M-a""#.into())
        );
    }

    #[test]
    fn expressions_are_verbatim() {
        assert_eq!(
            value_of("\"/etc/#{name}.conf\""),
            Value::Expression("\"/etc/#{name}.conf\"".into())
        );
        assert_eq!(
            value_of("node['app']['name']"),
            Value::Expression("node['app']['name']".into())
        );
        assert!(!value_of("lazy { 1 }").is_literal());
    }

    #[test]
    fn collections() {
        assert_eq!(
            value_of("[:enable, :start]"),
            Value::Array(vec![
                Value::Symbol("enable".into()),
                Value::Symbol("start".into())
            ])
        );
        assert_eq!(value_of("%w(a b)"), Value::from(vec!["a", "b"]));

        let Value::Object(object) = value_of("{ port: 80, 'host' => name }") else {
            panic!("hash must be an object");
        };
        assert_eq!(object.get("port"), Some(&Value::Integer(80)));
        assert_eq!(object.get("host"), Some(&Value::Expression("name".into())));
    }

    #[test]
    fn serialization() {
        let value = Value::Array(vec![
            Value::Symbol("start".into()),
            Value::Expression("x + 1".into()),
            Value::Null,
        ]);
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            serde_json::json!([":start", { "expr": "x + 1" }, null])
        );
    }
}
