use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::address::Address;
use crate::models::booking::{
    Booking, BookingChanges, BookingItem, BookingQuery, BookingStatus, NewBooking,
};
use crate::models::notification::{NewNotification, Notification};
use crate::models::provider::ProviderCandidate;
use crate::models::service::Service;
use crate::services::{
    AddressBook, BookingStore, CollaboratorError, NotificationStore, ProviderDirectory,
    ServiceCatalog,
};

/// Process-local store backing every persistence contract. Status updates
/// are compare-and-set under the map's per-entry lock.
pub struct MemoryStore {
    providers: DashMap<Uuid, ProviderCandidate>,
    services: DashMap<Uuid, Service>,
    addresses: DashMap<Uuid, Address>,
    bookings: DashMap<Uuid, Booking>,
    booking_items: DashMap<Uuid, Vec<BookingItem>>,
    notifications: DashMap<Uuid, Notification>,
    notification_events_tx: broadcast::Sender<Notification>,
}

impl MemoryStore {
    pub fn new(event_buffer_size: usize) -> Self {
        let (notification_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            providers: DashMap::new(),
            services: DashMap::new(),
            addresses: DashMap::new(),
            bookings: DashMap::new(),
            booking_items: DashMap::new(),
            notifications: DashMap::new(),
            notification_events_tx,
        }
    }

    pub fn insert_service(&self, service: Service) {
        self.services.insert(service.id, service);
    }

    pub fn insert_address(&self, address: Address) {
        self.addresses.insert(address.id, address);
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.notification_events_tx.subscribe()
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        let mut found: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|notification| notification.created_at);
        found
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.len()
    }
}

#[async_trait]
impl ProviderDirectory for MemoryStore {
    async fn verified_active_providers(&self) -> Result<Vec<ProviderCandidate>, CollaboratorError> {
        Ok(self
            .providers
            .iter()
            .filter(|entry| entry.value().is_eligible())
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_provider(&self, id: Uuid) -> Result<Option<ProviderCandidate>, CollaboratorError> {
        Ok(self.providers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn upsert_provider(&self, provider: ProviderCandidate) -> Result<(), CollaboratorError> {
        self.providers.insert(provider.provider_id, provider);
        Ok(())
    }
}

#[async_trait]
impl ServiceCatalog for MemoryStore {
    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, CollaboratorError> {
        Ok(self.services.get(&id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl AddressBook for MemoryStore {
    async fn get_address(&self, id: Uuid) -> Result<Option<Address>, CollaboratorError> {
        Ok(self.addresses.get(&id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn create_booking(&self, new: NewBooking) -> Result<Booking, CollaboratorError> {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            customer_id: new.customer_id,
            provider_id: None,
            address_id: new.address_id,
            service_date: new.service_date,
            duration_minutes: new.duration_minutes,
            status: BookingStatus::Pending,
            subtotal: new.subtotal,
            commission: new.commission,
            processing_fee: new.processing_fee,
            discount_amount: new.discount_amount,
            total_amount: new.total_amount,
            special_instructions: new.special_instructions,
            home_details: new.home_details,
            recurring_frequency: new.recurring_frequency,
            payment_method_id: new.payment_method_id,
            payment_intent_id: None,
            assigned_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn create_booking_items(
        &self,
        booking_id: Uuid,
        items: &[BookingItem],
    ) -> Result<(), CollaboratorError> {
        if !self.bookings.contains_key(&booking_id) {
            return Err(CollaboratorError::NotFound(format!(
                "booking {booking_id} not found"
            )));
        }

        self.booking_items.insert(booking_id, items.to_vec());
        Ok(())
    }

    async fn delete_booking(&self, booking_id: Uuid) -> Result<(), CollaboratorError> {
        self.booking_items.remove(&booking_id);
        self.bookings.remove(&booking_id);
        Ok(())
    }

    async fn get_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<(Booking, Vec<BookingItem>)>, CollaboratorError> {
        let Some(booking) = self.bookings.get(&booking_id).map(|entry| entry.value().clone())
        else {
            return Ok(None);
        };

        let items = self
            .booking_items
            .get(&booking_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        Ok(Some((booking, items)))
    }

    async fn list_customer_bookings(
        &self,
        customer_id: Uuid,
        query: BookingQuery,
    ) -> Result<Vec<Booking>, CollaboratorError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|entry| {
                let booking = entry.value();
                booking.customer_id == customer_id
                    && query.status.is_none_or(|status| booking.status == status)
            })
            .map(|entry| entry.value().clone())
            .collect();

        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(bookings
            .into_iter()
            .skip(query.offset())
            .take(query.limit as usize)
            .collect())
    }

    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
        changes: BookingChanges,
    ) -> Result<Booking, CollaboratorError> {
        let mut booking = self
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("booking {booking_id} not found")))?;

        if booking.status != expected {
            return Err(CollaboratorError::Conflict(format!(
                "booking {booking_id} is {} (expected {expected})",
                booking.status
            )));
        }

        if !changes.precondition_holds(&booking) {
            return Err(CollaboratorError::Conflict(format!(
                "booking {booking_id} provider changed underneath"
            )));
        }

        booking.status = next;
        changes.apply(&mut booking);
        booking.updated_at = Utc::now();

        Ok(booking.clone())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_notification(
        &self,
        new: NewNotification,
    ) -> Result<Notification, CollaboratorError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            data: new.data,
            is_read: false,
            created_at: Utc::now(),
        };

        self.notifications
            .insert(notification.id, notification.clone());
        let _ = self.notification_events_tx.send(notification.clone());

        Ok(notification)
    }
}
