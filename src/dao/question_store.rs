use std::path::PathBuf;

use futures::future::BoxFuture;
use tokio::fs;

use crate::dao::models::QuestionEntity;
use crate::dao::storage::{StorageError, StorageResult};

/// Abstraction over the question bank.
///
/// The engine reads the bank exactly once per round start; everything else
/// about how questions are produced (files, editors, imports) stays behind
/// this trait.
pub trait QuestionStore: Send + Sync {
    /// Load every question record in bank order.
    fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Cheap probe that the bank is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Question store reading a JSON array of records from a local file.
#[derive(Debug, Clone)]
pub struct FileQuestionStore {
    path: PathBuf,
}

impl FileQuestionStore {
    /// Create a store reading from `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_bank(path: PathBuf) -> StorageResult<Vec<QuestionEntity>> {
        let bytes = fs::read(&path).await.map_err(|err| {
            StorageError::unavailable(format!("reading `{}`", path.display()), err)
        })?;

        serde_json::from_slice(&bytes)
            .map_err(|err| StorageError::corrupt(format!("decoding `{}`", path.display()), err))
    }
}

impl QuestionStore for FileQuestionStore {
    fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let path = self.path.clone();
        Box::pin(Self::read_bank(path))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        Box::pin(async move {
            fs::metadata(&path).await.map_err(|err| {
                StorageError::unavailable(format!("probing `{}`", path.display()), err)
            })?;
            Ok(())
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Fixed-content store used by service tests.
    pub struct StaticQuestionStore {
        bank: Vec<QuestionEntity>,
    }

    impl StaticQuestionStore {
        /// Build a store serving exactly `bank`.
        pub fn new(bank: Vec<QuestionEntity>) -> Self {
            Self { bank }
        }
    }

    impl QuestionStore for StaticQuestionStore {
        fn load_all(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
            let bank = self.bank.clone();
            Box::pin(async move { Ok(bank) })
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }
}
