/// Compute-once cache invalidated on write.
///
/// Replaces ad-hoc dirty flags: holders call `invalidate` from every mutator
/// that affects the cached value and `get_or_insert_with` from read paths.
/// Never serialized — embedders mark the field `#[serde(skip)]` and the
/// value is recomputed after reload.
#[derive(Debug, Clone)]
pub struct Memo<V> {
    value: Option<V>,
}

impl<V> Default for Memo<V> {
    fn default() -> Self {
        Memo::new()
    }
}

impl<V> Memo<V> {
    pub fn new() -> Self {
        Memo { value: None }
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    pub fn get(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn get_or_insert_with(&mut self, compute: impl FnOnce() -> V) -> &V {
        self.value.get_or_insert_with(compute)
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once_until_invalidated() {
        let mut memo: Memo<u32> = Memo::new();
        let mut calls = 0;
        assert!(!memo.is_valid());

        let v = *memo.get_or_insert_with(|| {
            calls += 1;
            7
        });
        assert_eq!(v, 7);

        // Second read hits the cache.
        let v = *memo.get_or_insert_with(|| {
            calls += 1;
            8
        });
        assert_eq!(v, 7);
        assert_eq!(calls, 1);

        memo.invalidate();
        assert!(!memo.is_valid());
        let v = *memo.get_or_insert_with(|| {
            calls += 1;
            8
        });
        assert_eq!(v, 8);
        assert_eq!(calls, 2);
    }
}
