use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::Result;

/// A typed aggregate root.
///
/// The engine works on the `serde_json` form of the value, so field names
/// must match the property names of the registered entity descriptor.
pub trait Aggregate: Serialize + DeserializeOwned {
    /// Name of the registered root entity.
    const ENTITY: &'static str;
}

/// The operations available on typed aggregates.
pub trait AggregateOperations {
    /// Inserts a new aggregate and returns it with generated ids and version set.
    fn insert<T: Aggregate>(&self, aggregate: T) -> Result<T>;

    fn insert_all<T: Aggregate>(&self, aggregates: impl IntoIterator<Item = T>) -> Result<Vec<T>> {
        aggregates.into_iter().map(|a| self.insert(a)).collect()
    }

    /// Updates the root row and replaces all owned children.
    fn update<T: Aggregate>(&self, aggregate: T) -> Result<T>;

    fn update_all<T: Aggregate>(&self, aggregates: impl IntoIterator<Item = T>) -> Result<Vec<T>> {
        aggregates.into_iter().map(|a| self.update(a)).collect()
    }

    /// Inserts new aggregates, updates existing ones.
    fn save<T: Aggregate>(&self, aggregate: T) -> Result<T>;

    fn save_all<T: Aggregate>(&self, aggregates: impl IntoIterator<Item = T>) -> Result<Vec<T>> {
        aggregates.into_iter().map(|a| self.save(a)).collect()
    }

    fn find_by_id<T: Aggregate>(&self, id: &impl Serialize) -> Result<Option<T>>;

    fn find_all_by_id<T: Aggregate>(&self, ids: &[impl Serialize]) -> Result<Vec<T>>;

    fn find_all<T: Aggregate>(&self) -> Result<Vec<T>>;

    fn exists_by_id<T: Aggregate>(&self, id: &impl Serialize) -> Result<bool>;

    fn count<T: Aggregate>(&self) -> Result<usize>;

    /// Deletes the aggregate, checking its version when it has one.
    fn delete<T: Aggregate>(&self, aggregate: &T) -> Result<()>;

    fn delete_by_id<T: Aggregate>(&self, id: &impl Serialize) -> Result<()>;

    fn delete_all_by_id<T: Aggregate>(&self, ids: &[impl Serialize]) -> Result<()> {
        for id in ids {
            self.delete_by_id::<T>(id)?;
        }
        Ok(())
    }

    /// Deletes every aggregate of type `T`.
    fn delete_all<T: Aggregate>(&self) -> Result<()>;
}
