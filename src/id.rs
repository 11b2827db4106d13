use rand::{Rng, distributions::Alphanumeric};

/// Length of generated ids; matches a base64 digest with the padding stripped.
pub const DEFAULT_ID_LENGTH: usize = 22;

/// Source of identifiers for newly created entities.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// URL-safe random tokens drawn from `[A-Za-z0-9]`.
#[derive(Clone, Debug)]
pub struct RandomIdGenerator {
    length: usize,
}

impl RandomIdGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_LENGTH)
    }
}

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_url_safe_and_sized() {
        let ids = RandomIdGenerator::new(12);
        let id = ids.generate();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, ids.generate());
    }
}
