// -------------------------------------------------------------------
// Versioned
// -------------------------------------------------------------------

#[derive(Clone)]
pub struct Versioned<T> {
    version: u64,
    data: T,
}

impl<T> Versioned<T> {
    pub fn new(data: T) -> Self {
        Self { version: 0, data }
    }
    pub fn get(&self) -> &T {
        &self.data
    }
    pub fn set(&mut self, data: T) {
        self.data = data;
        self.version = self.version.wrapping_add(1);
    }
    pub fn version(&self) -> u64 {
        self.version
    }
}

// -------------------------------------------------------------------
// Memoized
// -------------------------------------------------------------------

pub struct Memoized<S, K, V> {
    last_key: Option<K>,
    last_value: Option<V>,
    get_key: Box<dyn Fn(&S) -> K>,
    calc: Box<dyn Fn(&S) -> V>,
}

impl<S, K, V> Memoized<S, K, V>
where
    K: PartialEq,
{
    pub fn new(
        get_key: impl Fn(&S) -> K + 'static,
        calc: impl Fn(&S) -> V + 'static,
    ) -> Self {
        Self {
            last_key: None,
            last_value: None,
            get_key: Box::new(get_key),
            calc: Box::new(calc),
        }
    }

    /// Recompute only if the key changed; return a reference to the cached value.
    pub fn get<'a>(&'a mut self, store: &S) -> &'a V {
        let key = (self.get_key)(store);
        if self.last_key.as_ref() != Some(&key) {
            self.last_key = Some(key);
            self.last_value = None;
        }
        let calc = &self.calc;
        self.last_value.get_or_insert_with(|| calc(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_memoized_recomputes_only_on_key_change() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut memo = Memoized::new(
            |s: &Versioned<i32>| s.version(),
            move |s: &Versioned<i32>| {
                counter.set(counter.get() + 1);
                *s.get() * 2
            },
        );
        let mut source = Versioned::new(4);

        assert_eq!(*memo.get(&source), 8);
        assert_eq!(*memo.get(&source), 8);
        assert_eq!(calls.get(), 1, "same key must hit the cache");

        source.set(5);
        assert_eq!(*memo.get(&source), 10);
        assert_eq!(calls.get(), 2);
    }
}
