/// Source of fresh token and segment ids.
pub trait IdGenerator: Send {
    fn next_id(&mut self) -> String;
}

#[derive(Debug, Default)]
pub struct UuidIdGen;

impl IdGenerator for UuidIdGen {
    fn next_id(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic generator for tests and reproducible replays: `{prefix}0`,
/// `{prefix}1`, ...
#[derive(Debug)]
pub struct SequentialIdGen {
    prefix: String,
    next: u64,
}

impl SequentialIdGen {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: 0,
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("n")
    }
}

impl IdGenerator for SequentialIdGen {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}
