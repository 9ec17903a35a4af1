use serde::Serialize;
use serde_json::json;
use std::time::Duration;

/// Flush after this many buffered actions.
pub const BULK_ACTIONS: usize = 1000;

/// Flush at least this often while items keep arriving.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// NDJSON buffer for the `_bulk` endpoint.
#[derive(Debug)]
pub(crate) struct BulkBatch {
    index: String,
    doc_type: String,
    body: Vec<u8>,
    len: usize,
}

impl BulkBatch {
    pub fn new(index: &str, doc_type: &str) -> Self {
        Self {
            index: index.to_string(),
            doc_type: doc_type.to_string(),
            body: Vec::new(),
            len: 0,
        }
    }

    /// Appends an index action. Fails only when `doc` cannot be serialized,
    /// in which case the batch is left unchanged.
    pub fn push<T: Serialize>(&mut self, id: &str, doc: &T) -> serde_json::Result<()> {
        let source = serde_json::to_vec(doc)?;
        let action = json!({
            "index": { "_index": self.index, "_type": self.doc_type, "_id": id }
        });

        serde_json::to_writer(&mut self.body, &action)?;
        self.body.push(b'\n');
        self.body.extend_from_slice(&source);
        self.body.push(b'\n');
        self.len += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= BULK_ACTIONS
    }

    /// Takes the buffered body and action count, leaving the batch empty.
    pub fn take(&mut self) -> (Vec<u8>, usize) {
        let len = std::mem::take(&mut self.len);
        (std::mem::take(&mut self.body), len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_ndjson_layout() {
        let mut batch = BulkBatch::new("myindex", "mytype");
        batch.push("1", &json!({"code": "a"})).unwrap();
        batch.push("2", &json!({"code": "b"})).unwrap();
        assert_eq!(batch.len(), 2);

        let (body, len) = batch.take();
        assert_eq!(len, 2);
        assert!(batch.is_empty());

        let text = String::from_utf8(body).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["index"]["_id"], "1");
        assert_eq!(lines[0]["index"]["_type"], "mytype");
        assert_eq!(lines[3]["code"], "b");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_full_at_bulk_actions() {
        let mut batch = BulkBatch::new("i", "t");
        for i in 0..BULK_ACTIONS {
            assert!(!batch.is_full());
            batch.push(&i.to_string(), &i).unwrap();
        }
        assert!(batch.is_full());
    }
}
