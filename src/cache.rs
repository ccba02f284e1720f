use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Storage for the children already resolved by one loader.
///
/// A cache belongs to a single `LoaderWorker` and therefore to a single request. It is never
/// shared between loaders.
pub trait Cache {
    type K;
    type V;

    /// Returns all the values associated with the provided keys in order with their respective
    /// keys.
    fn get(&self, keys: &[Self::K]) -> Vec<Option<&Self::V>>;

    /// Returns key value pairs for the requested keys.
    fn get_key_vals<'cache, 'a>(
        &'cache self,
        keys: &'a [Self::K],
    ) -> Vec<(&'a Self::K, Option<&'cache Self::V>)>;

    fn insert(&mut self, key: Self::K, value: Self::V);
    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I);

    fn remove(&mut self, keys: &[Self::K]);
    fn flush(&mut self);

    /// Number of keys currently resolved.
    fn len(&self) -> usize;
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn get(&self, keys: &[Self::K]) -> Vec<Option<&Self::V>> {
        keys.iter().map(|k| HashMap::get(self, k)).collect::<Vec<_>>()
    }

    fn get_key_vals<'cache, 'a>(
        &'cache self,
        keys: &'a [Self::K],
    ) -> Vec<(&'a Self::K, Option<&'cache Self::V>)> {
        keys.iter().map(|k| (k, HashMap::get(self, k))).collect::<Vec<_>>()
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        HashMap::insert(self, key, value);
    }

    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I) {
        for (key, value) in key_vals.into_iter() {
            HashMap::insert(self, key, value);
        }
    }

    fn remove(&mut self, keys: &[Self::K]) {
        for key in keys.iter() {
            HashMap::remove(self, key);
        }
    }

    fn flush(&mut self) {
        self.clear();
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }
}
