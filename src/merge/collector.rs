use super::error::Rejection;
use crate::model::ErrorRecord;

/// 软失败收集器：按输入顺序追加，不去重、不截断
#[derive(Debug, Default, Clone)]
pub struct ErrorCollector {
    records: Vec<ErrorRecord>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, file: &str, rejection: &Rejection) {
        self.records.push(ErrorRecord {
            file: file.to_string(),
            reason: rejection.to_string(),
        });
    }

    pub fn rejected_count(&self) -> usize {
        self.records.len()
    }

    pub fn into_records(self) -> Vec<ErrorRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_keep_order_and_duplicates() {
        let mut collector = ErrorCollector::new();
        collector.record("a.txt", &Rejection::UnsupportedType { extension: "txt".into() });
        collector.record("b.pdf", &Rejection::EmptyPayload);
        collector.record("a.txt", &Rejection::UnsupportedType { extension: "txt".into() });

        assert_eq!(collector.rejected_count(), 3);

        let records = collector.into_records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].file, "a.txt");
        assert_eq!(records[1].reason, "empty file");
        assert_eq!(records[0], records[2]);
    }
}
