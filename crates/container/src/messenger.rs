use trellis_common::EntityHandle;
use trellis_kernel::Object;

/// Method dispatch into the scripting runtime.
///
/// Containers use it to deliver notifications such as `onReset` and
/// `lateUpdate`; what the receiving object does with them is up to the host.
pub trait Messenger {
    fn send(&mut self, target: EntityHandle, object: &Object, message: &str);
}

impl<F> Messenger for F
where
    F: FnMut(EntityHandle, &Object, &str),
{
    fn send(&mut self, target: EntityHandle, object: &Object, message: &str) {
        self(target, object, message)
    }
}

/// Messenger that records every delivery.
#[derive(Debug, Default)]
pub struct MessageLog {
    sent: Vec<(EntityHandle, String)>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &[(EntityHandle, String)] {
        &self.sent
    }

    /// Number of deliveries of `message` to any object.
    pub fn count(&self, message: &str) -> usize {
        self.sent.iter().filter(|(_, m)| m == message).count()
    }

    pub fn received(&self, target: EntityHandle, message: &str) -> bool {
        self.sent.iter().any(|(h, m)| *h == target && m == message)
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl Messenger for MessageLog {
    fn send(&mut self, target: EntityHandle, _object: &Object, message: &str) {
        self.sent.push((target, message.to_string()));
    }
}
