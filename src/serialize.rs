//! Serialization of PDF objects for the appended incremental section.

use crate::object::Object;
use std::io::Write;

/// Writes `Object` values back out as PDF syntax.
#[derive(Debug, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_object(&mut out, obj).expect("writing to Vec cannot fail");
        out
    }

    /// Serialize an object wrapped as "id gen obj ... endobj".
    pub fn serialize_indirect(&self, id: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut out = Vec::new();
        write!(out, "{} {} obj\n", id, gen).expect("writing to Vec cannot fail");
        self.write_object(&mut out, obj).expect("writing to Vec cannot fail");
        out.extend_from_slice(b"\nendobj\n");
        out
    }

    fn write_object<W: Write>(&self, w: &mut W, obj: &Object) -> std::io::Result<()> {
        match obj {
            Object::Null => w.write_all(b"null"),
            Object::Boolean(true) => w.write_all(b"true"),
            Object::Boolean(false) => w.write_all(b"false"),
            Object::Integer(i) => write!(w, "{}", i),
            Object::Real(r) => self.write_real(w, *r),
            Object::String(s) => self.write_string(w, s),
            Object::Name(n) => self.write_name(w, n),
            Object::Array(items) => self.write_array(w, items),
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => {
                self.write_dictionary(w, dict)?;
                w.write_all(b"\nstream\n")?;
                w.write_all(data)?;
                w.write_all(b"\nendstream")
            },
            Object::Reference(r) => write!(w, "{} {} R", r.id, r.gen),
        }
    }

    /// Reals are written without a trailing fractional part when integral.
    fn write_real<W: Write>(&self, w: &mut W, value: f64) -> std::io::Result<()> {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            write!(w, "{}", value as i64)
        } else {
            write!(w, "{}", value)
        }
    }

    fn write_string<W: Write>(&self, w: &mut W, data: &[u8]) -> std::io::Result<()> {
        w.write_all(b"(")?;
        for &b in data {
            match b {
                b'\\' => w.write_all(b"\\\\")?,
                b'(' => w.write_all(b"\\(")?,
                b')' => w.write_all(b"\\)")?,
                b'\n' => w.write_all(b"\\n")?,
                b'\r' => w.write_all(b"\\r")?,
                b'\t' => w.write_all(b"\\t")?,
                other => w.write_all(&[other])?,
            }
        }
        w.write_all(b")")
    }

    /// Names escape characters outside the regular set as #xx.
    fn write_name<W: Write>(&self, w: &mut W, name: &str) -> std::io::Result<()> {
        w.write_all(b"/")?;
        for &b in name.as_bytes() {
            let regular = !crate::lexer::is_whitespace(b)
                && !crate::lexer::is_delimiter(b)
                && b != b'#'
                && b.is_ascii_graphic();
            if regular {
                w.write_all(&[b])?;
            } else {
                write!(w, "#{:02X}", b)?;
            }
        }
        Ok(())
    }

    fn write_array<W: Write>(&self, w: &mut W, items: &[Object]) -> std::io::Result<()> {
        w.write_all(b"[")?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                w.write_all(b" ")?;
            }
            self.write_object(w, item)?;
        }
        w.write_all(b"]")
    }

    fn write_dictionary<W: Write>(
        &self,
        w: &mut W,
        dict: &std::collections::HashMap<String, Object>,
    ) -> std::io::Result<()> {
        // Sorted keys keep output deterministic across runs
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();

        w.write_all(b"<< ")?;
        for key in keys {
            self.write_name(w, key)?;
            w.write_all(b" ")?;
            self.write_object(w, &dict[key])?;
            w.write_all(b" ")?;
        }
        w.write_all(b">>")
    }
}

/// Convenience constructors for assembling objects to serialize.
impl ObjectSerializer {
    /// Build a name object.
    pub fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    /// Build a string object.
    pub fn string(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec())
    }

    /// Build an integer object.
    pub fn integer(i: i64) -> Object {
        Object::Integer(i)
    }

    /// Build an array object.
    pub fn array(items: Vec<Object>) -> Object {
        Object::Array(items)
    }

    /// Build a dictionary object.
    pub fn dict(entries: Vec<(&str, Object)>) -> Object {
        Object::Dictionary(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    /// Build an indirect reference object.
    pub fn reference(id: u32, gen: u16) -> Object {
        Object::Reference(crate::object::ObjectRef::new(id, gen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;
    use std::collections::HashMap;

    fn serialize(obj: &Object) -> String {
        String::from_utf8(ObjectSerializer::new().serialize(obj)).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(serialize(&Object::Null), "null");
        assert_eq!(serialize(&Object::Boolean(true)), "true");
        assert_eq!(serialize(&Object::Integer(-5)), "-5");
        assert_eq!(serialize(&Object::Real(2.0)), "2");
        assert_eq!(serialize(&Object::Real(2.5)), "2.5");
        assert_eq!(serialize(&Object::Name("Sig".to_string())), "/Sig");
        assert_eq!(serialize(&Object::Reference(ObjectRef::new(7, 0))), "7 0 R");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(
            serialize(&Object::String(b"a(b)c\\d".to_vec())),
            "(a\\(b\\)c\\\\d)"
        );
    }

    #[test]
    fn test_name_escaping() {
        assert_eq!(serialize(&Object::Name("A B".to_string())), "/A#20B");
    }

    #[test]
    fn test_array_and_dict() {
        let arr = Object::Array(vec![Object::Integer(1), Object::Name("Two".to_string())]);
        assert_eq!(serialize(&arr), "[1 /Two]");

        let mut dict = HashMap::new();
        dict.insert("Type".to_string(), Object::Name("Page".to_string()));
        dict.insert("Count".to_string(), Object::Integer(1));
        // keys sorted: Count before Type
        assert_eq!(serialize(&Object::Dictionary(dict)), "<< /Count 1 /Type /Page >>");
    }

    #[test]
    fn test_roundtrip_through_parser() {
        let mut dict = HashMap::new();
        dict.insert(
            "Kids".to_string(),
            Object::Array(vec![Object::Reference(ObjectRef::new(3, 0))]),
        );
        dict.insert("Name".to_string(), Object::String(b"SIAE (test)".to_vec()));
        let original = Object::Dictionary(dict);

        let bytes = ObjectSerializer::new().serialize(&original);
        let mut with_sentinel = bytes.clone();
        with_sentinel.push(b' ');
        let (_, parsed) = crate::parser::parse_object(&with_sentinel).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_serialize_indirect() {
        let out = ObjectSerializer::new().serialize_indirect(5, 0, &Object::Integer(9));
        assert_eq!(String::from_utf8(out).unwrap(), "5 0 obj\n9\nendobj\n");
    }
}
