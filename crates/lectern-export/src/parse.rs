//! CSV reader for the dialect produced by [`crate::to_csv`].

use serde_json::Value;

use crate::{Error, Record, Result};

/// Split CSV text into rows of unescaped fields.
///
/// Accepts `\n` and `\r\n` row endings; line breaks inside quoted fields are
/// kept. Empty input yields no rows.
pub fn parse_csv(input: &str) -> Result<Vec<Vec<String>>> {
  let mut rows = Vec::new();
  if input.is_empty() {
    return Ok(rows);
  }

  let mut row = Vec::new();
  let mut field = String::new();
  let mut in_quotes = false;
  let mut line = 1usize;
  let mut chars = input.chars().peekable();

  while let Some(c) = chars.next() {
    if in_quotes {
      match c {
        '"' if chars.peek() == Some(&'"') => {
          chars.next();
          field.push('"');
        }
        '"' => in_quotes = false,
        '\n' => {
          line += 1;
          field.push(c);
        }
        _ => field.push(c),
      }
      continue;
    }

    match c {
      '"' if field.is_empty() => in_quotes = true,
      '"' => {
        return Err(Error::MalformedCsv { line, reason: "stray quote" });
      }
      ',' => row.push(std::mem::take(&mut field)),
      '\r' if chars.peek() == Some(&'\n') => {}
      '\n' => {
        row.push(std::mem::take(&mut field));
        rows.push(std::mem::take(&mut row));
        line += 1;
      }
      _ => field.push(c),
    }
  }

  if in_quotes {
    return Err(Error::MalformedCsv { line, reason: "unterminated quoted field" });
  }
  row.push(field);
  rows.push(row);
  Ok(rows)
}

/// Parse CSV with a header row into records whose values are all strings.
pub fn parse_records(input: &str) -> Result<Vec<Record>> {
  let mut rows = parse_csv(input)?.into_iter();
  let Some(headers) = rows.next() else {
    return Ok(Vec::new());
  };

  Ok(
    rows
      .map(|row| {
        headers
          .iter()
          .cloned()
          .zip(row.into_iter().map(Value::String))
          .collect::<Record>()
      })
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::{serialize::field_text, to_csv};

  #[test]
  fn round_trips_plain_records() {
    let records: Vec<Record> = vec![
      serde_json::from_value(json!({"id": "e-1", "status": "active", "hours": 1.5})).unwrap(),
      serde_json::from_value(json!({"id": "e-2", "status": "completed", "hours": 0})).unwrap(),
    ];
    let parsed = parse_records(&to_csv(&records)).unwrap();
    assert_eq!(parsed.len(), records.len());
    for (original, back) in records.iter().zip(&parsed) {
      assert_eq!(original.keys().collect::<Vec<_>>(), back.keys().collect::<Vec<_>>());
      for (key, value) in original {
        assert_eq!(back[key], Value::String(field_text(value)), "field {key}");
      }
    }
  }

  #[test]
  fn round_trips_quoted_fields() {
    let records: Vec<Record> =
      vec![serde_json::from_value(json!({"title": "a, \"b\"\nc"})).unwrap()];
    let parsed = parse_records(&to_csv(&records)).unwrap();
    assert_eq!(parsed[0]["title"], json!("a, \"b\"\nc"));
  }

  #[test]
  fn crlf_rows_are_accepted() {
    let rows = parse_csv("a,b\r\n1,2").unwrap();
    assert_eq!(rows, vec![vec!["a", "b"], vec!["1", "2"]]);
  }

  #[test]
  fn unterminated_quote_is_an_error() {
    assert!(matches!(
      parse_csv("a\n\"oops"),
      Err(Error::MalformedCsv { line: 2, .. })
    ));
  }

  #[test]
  fn empty_input_has_no_records() {
    assert!(parse_records("").unwrap().is_empty());
  }
}
