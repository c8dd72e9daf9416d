//! Subscriber lists for session notifications.

/// An explicit list of subscriber callbacks, invoked in registration
/// order. Notifications are fire-and-forget; no return value is consumed.
pub(crate) struct Notify<A> {
    subscribers: Vec<Box<dyn FnMut(A)>>,
}

impl<A> Default for Notify<A> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<A: Copy> Notify<A> {
    pub fn subscribe(&mut self, subscriber: impl FnMut(A) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn emit(&mut self, args: A) {
        for subscriber in &mut self.subscribers {
            subscriber(args);
        }
    }
}
