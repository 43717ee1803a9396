pub mod config;
pub mod export;
pub mod import;

use anyhow::Result;
use schoolsync::lens::utils::OutputFormat;
use schoolsync::SchoolStore;
use serde::Serialize;
use tracing::warn;

/// Print a serializable value as JSON; table formats are handled by callers
pub(crate) fn print_json<T: Serialize>(value: &T, output_format: OutputFormat) {
    let result = match output_format {
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value),
        _ => serde_json::to_string(value),
    };
    match result {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
    }
}

/// Close the store whether or not the work on it succeeded
///
/// A close failure is returned after a successful run; after a failed run
/// it is only logged so the original error is the one reported.
pub(crate) fn close_after<T>(store: Box<dyn SchoolStore>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            store.close()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(close_err) = store.close() {
                warn!("failed to close store after error: {}", close_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use schoolsync::database::{SqlValue, TableDef};
    use schoolsync::{StoredStudent, StudentRecord};
    use std::cell::Cell;
    use std::rc::Rc;

    struct TrackedStore {
        closed: Rc<Cell<bool>>,
        fail_close: bool,
    }

    impl SchoolStore for TrackedStore {
        fn backend_name(&self) -> &'static str {
            "tracked"
        }
        fn recreate_schema(&mut self) -> Result<()> {
            Err(anyhow!("schema blocked"))
        }
        fn upsert_student(&mut self, _record: &StudentRecord) -> Result<()> {
            Ok(())
        }
        fn upsert_row(&mut self, _table: &TableDef, _values: &[SqlValue]) -> Result<()> {
            Ok(())
        }
        fn read_students(&mut self) -> Result<Vec<StoredStudent>> {
            Ok(Vec::new())
        }
        fn read_rows(&mut self, _table: &TableDef) -> Result<Vec<Vec<SqlValue>>> {
            Ok(Vec::new())
        }
        fn close(self: Box<Self>) -> Result<()> {
            self.closed.set(true);
            if self.fail_close {
                Err(anyhow!("close failed"))
            } else {
                Ok(())
            }
        }
    }

    fn tracked(fail_close: bool) -> (Box<dyn SchoolStore>, Rc<Cell<bool>>) {
        let closed = Rc::new(Cell::new(false));
        let store = TrackedStore {
            closed: closed.clone(),
            fail_close,
        };
        (Box::new(store), closed)
    }

    #[test]
    fn test_store_closed_when_run_fails() {
        let (mut store, closed) = tracked(false);
        let result = store.recreate_schema();
        let err = close_after(store, result).unwrap_err();
        assert_eq!(err.to_string(), "schema blocked");
        assert!(closed.get());
    }

    #[test]
    fn test_close_error_does_not_mask_run_error() {
        let (mut store, closed) = tracked(true);
        let result = store.recreate_schema();
        let err = close_after(store, result).unwrap_err();
        assert_eq!(err.to_string(), "schema blocked");
        assert!(closed.get());
    }

    #[test]
    fn test_close_error_reported_after_success() {
        let (store, closed) = tracked(true);
        assert!(close_after(store, Ok(1)).is_err());
        assert!(closed.get());

        let (store, closed) = tracked(false);
        assert_eq!(close_after(store, Ok(1)).unwrap(), 1);
        assert!(closed.get());
    }
}
