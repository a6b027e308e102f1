use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;

/// Extension helpers for `DashMap` that keep shard guards short-lived.
///
/// `DashMap::get()` and `DashMap::iter()` return guard types that hold a shard lock.
/// Scoring a message against a table while those guards are alive would block
/// every writer on the same shard for the whole match.
///
/// These helpers clone values out, or scope a mutation to a closure, so the
/// guard drops before the caller continues.
pub trait DashMapExt<K, V> {
    /// Clone the value for `key` (dropping the DashMap guard immediately).
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone;

    /// Collect all `(key, value)` pairs by cloning them (dropping guards immediately).
    fn iter_cloned(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone;

    /// Run `f` on the value for `key` under its shard write lock.
    fn update_with<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized;
}

impl<K, V> DashMapExt<K, V> for DashMap<K, V>
where
    K: Eq + Hash,
{
    fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get(key).map(|r| r.value().clone())
    }

    fn iter_cloned(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    fn update_with<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_mut(key).map(|mut r| f(r.value_mut()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloned_reads() {
        let map: DashMap<String, f32> = DashMap::new();
        map.insert("a".to_string(), 0.5);
        assert_eq!(map.get_cloned("a"), Some(0.5));
        assert_eq!(map.get_cloned("b"), None);
        assert_eq!(map.iter_cloned(), vec![("a".to_string(), 0.5)]);
    }

    #[test]
    fn scoped_update() {
        let map: DashMap<String, f32> = DashMap::new();
        map.insert("a".to_string(), 0.5);
        let doubled = map.update_with("a", |w| {
            *w *= 2.0;
            *w
        });
        assert_eq!(doubled, Some(1.0));
        assert_eq!(map.update_with("missing", |w| *w), None);
        // guard released: a second writer on the same key does not deadlock
        map.insert("a".to_string(), 0.1);
        assert_eq!(map.get_cloned("a"), Some(0.1));
    }
}
