use crate::core::IdGenerator;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
