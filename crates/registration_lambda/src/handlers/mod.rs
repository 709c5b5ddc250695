use crate::adapters::queue::RegistrationQueue;
use crate::adapters::store::RegistrationStore;
use crate::adapters::text_generator::TextGenerator;
use crate::adapters::topic::NotificationTopic;

pub mod api;
pub mod dispatch;
pub mod generator;
pub mod post_confirmation;
pub mod register;
pub mod runtime;
pub mod subscription_status;

/// The managed-service clients a handler may reach for.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub store: &'a dyn RegistrationStore,
    pub queue: &'a dyn RegistrationQueue,
    pub model: &'a dyn TextGenerator,
    pub topic: &'a dyn NotificationTopic,
}
