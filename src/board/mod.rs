pub mod events;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::board::events::BoardEvent;
use crate::error::AppError;
use crate::models::assignment::AssignmentState;
use crate::models::courier::Courier;
use crate::models::delivery::{Delivery, STATUS_MENU};
use crate::observability::metrics::Metrics;
use crate::resources::deliveries::{delivery_detail, load_active_deliveries};
use crate::resources::personnel::load_personnel;
use crate::resources::{Loaded, Resource};
use crate::upstream::{DeliveryBackend, SharedBackend, search_term};
use crate::views::editor::{
    DeliveryEditForm, DeliveryEditView, SaveOutcome, SavingSet, apply_edit, save_error,
};
use crate::views::table::{DeliveryTableView, courier_options};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AssignmentOutcome {
    pub delivery_id: u64,
    pub courier_id: Option<u64>,
    pub state: AssignmentState,
    pub table: DeliveryTableView,
}

/// Everything the delivery page needs from one load: the caller's table
/// plus the unfiltered collections behind the header and the map.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardOverview {
    pub table: DeliveryTableView,
    pub deliveries: Loaded<Vec<Delivery>>,
    pub personnel: Loaded<Vec<Courier>>,
}

/// Active deliveries and personnel as the operators see them, plus the
/// writes made against them.
///
/// The shared resources hold the unfiltered collections only. Searches are
/// per caller and never touch them.
pub struct DeliveryBoard {
    backend: SharedBackend,
    deliveries: Resource<Vec<Delivery>>,
    personnel: Resource<Vec<Courier>>,
    rows: DashMap<u64, AssignmentState>,
    saving: SavingSet,
    events_tx: broadcast::Sender<BoardEvent>,
    metrics: Metrics,
}

impl DeliveryBoard {
    pub fn new(backend: SharedBackend, metrics: Metrics, event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            backend,
            deliveries: Resource::new().with_stale_counter(metrics.stale_responses_total.clone()),
            personnel: Resource::new().with_stale_counter(metrics.stale_responses_total.clone()),
            rows: DashMap::new(),
            saving: SavingSet::new(),
            events_tx,
            metrics,
        }
    }

    pub fn backend(&self) -> &dyn DeliveryBackend {
        self.backend.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events_tx.subscribe()
    }

    pub fn deliveries(&self) -> Loaded<Vec<Delivery>> {
        self.deliveries.snapshot()
    }

    pub fn personnel(&self) -> Loaded<Vec<Courier>> {
        self.personnel.snapshot()
    }

    fn publish(&self, event: BoardEvent) {
        let _ = self.events_tx.send(event);
    }

    fn assignment_of(&self, delivery_id: u64) -> AssignmentState {
        self.rows
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn table(
        &self,
        search: Option<&str>,
        deliveries: &Loaded<Vec<Delivery>>,
        personnel: &Loaded<Vec<Courier>>,
    ) -> DeliveryTableView {
        DeliveryTableView::build(
            search.map(str::to_string),
            deliveries,
            personnel,
            |delivery_id| self.assignment_of(delivery_id),
        )
    }

    /// Loads deliveries (filtered by `search`) and personnel concurrently
    /// and builds the caller's table from that result.
    pub async fn load(&self, search: Option<&str>) -> DeliveryTableView {
        let search = search_term(search);
        let (deliveries, personnel) =
            tokio::join!(self.fetch_deliveries(search), self.refresh_personnel());

        self.table(search, &deliveries, &personnel)
    }

    /// Like [`DeliveryBoard::load`], also returning the unfiltered
    /// deliveries for the page header and map.
    pub async fn overview(&self, search: Option<&str>) -> BoardOverview {
        let search = search_term(search);
        let filtered = async {
            match search {
                Some(term) => Some(load_active_deliveries(self.backend(), Some(term)).await),
                None => None,
            }
        };
        let (deliveries, filtered, personnel) =
            tokio::join!(self.refresh_deliveries(), filtered, self.refresh_personnel());

        BoardOverview {
            table: self.table(search, filtered.as_ref().unwrap_or(&deliveries), &personnel),
            deliveries,
            personnel,
        }
    }

    /// Active deliveries for one caller. Only the unfiltered list goes
    /// through the shared resource.
    pub async fn fetch_deliveries(&self, search: Option<&str>) -> Loaded<Vec<Delivery>> {
        match search_term(search) {
            Some(term) => load_active_deliveries(self.backend(), Some(term)).await,
            None => self.refresh_deliveries().await,
        }
    }

    /// Refetches the unfiltered active deliveries.
    pub async fn refresh_deliveries(&self) -> Loaded<Vec<Delivery>> {
        let loaded = self
            .deliveries
            .load(load_active_deliveries(self.backend(), None))
            .await;

        if loaded.is_ready() {
            self.prune_rows(&loaded.data);
        }
        self.publish(BoardEvent::BoardRefreshed {
            generation: self.deliveries.generation(),
            deliveries: loaded.data.len(),
            error: loaded.error.clone(),
        });
        loaded
    }

    /// Drops row states of deliveries that left the active list. Rows with
    /// a request in flight are kept until it settles.
    fn prune_rows(&self, active: &[Delivery]) {
        self.rows.retain(|delivery_id, state| {
            state.is_pending() || active.iter().any(|delivery| delivery.id == *delivery_id)
        });
    }

    pub async fn refresh_personnel(&self) -> Loaded<Vec<Courier>> {
        self.personnel.load(load_personnel(self.backend(), None)).await
    }

    /// Assigns (or with `None` unassigns) a courier from the table.
    ///
    /// Sends exactly one assignment request, records its outcome on the row
    /// and then refetches the caller's `search` whatever the outcome was.
    pub async fn assign(
        &self,
        delivery_id: u64,
        courier_id: Option<u64>,
        search: Option<&str>,
    ) -> AssignmentOutcome {
        let pending = AssignmentState::pending(courier_id);
        if let Some(attempt_id) = pending.attempt_id() {
            self.publish(BoardEvent::AssignmentRequested {
                attempt_id,
                delivery_id,
                courier_id,
            });
        }
        self.rows.insert(delivery_id, pending.clone());

        let result = self.backend.assign_courier(delivery_id, courier_id).await;
        Metrics::record_outcome(&self.metrics.assignments_total, result.is_ok());

        let settled = match result {
            Ok(()) => {
                info!(delivery_id, courier_id = ?courier_id, "courier assignment accepted");
                pending.settle(Ok(()))
            }
            Err(err) => {
                warn!(
                    delivery_id,
                    courier_id = ?courier_id,
                    error = %err,
                    "courier assignment failed"
                );
                pending.settle(Err(err.operator_message()))
            }
        };

        // A newer attempt for the same row owns the slot.
        if let Some(mut row) = self.rows.get_mut(&delivery_id) {
            if row.attempt_id() == settled.attempt_id() {
                *row = settled.clone();
            }
        }
        self.publish(BoardEvent::AssignmentSettled {
            delivery_id,
            state: settled.clone(),
        });

        let search = search_term(search);
        let deliveries = self.fetch_deliveries(search).await;

        AssignmentOutcome {
            delivery_id,
            courier_id,
            state: settled,
            table: self.table(search, &deliveries, &self.personnel()),
        }
    }

    pub fn is_saving(&self, delivery_id: u64) -> bool {
        self.saving.is_saving(delivery_id)
    }

    /// Edit page for the delivery matching `ident`, or `None` if no active
    /// delivery matches.
    pub async fn edit_view(&self, ident: &str) -> Result<Option<DeliveryEditView>, AppError> {
        let (detail, personnel) =
            tokio::join!(delivery_detail(self.backend(), ident), self.refresh_personnel());

        if let Some(message) = detail.error {
            return Err(AppError::BadGateway(message));
        }

        Ok(detail.data.map(|delivery| DeliveryEditView {
            form: DeliveryEditForm::for_delivery(&delivery),
            status_options: STATUS_MENU.to_vec(),
            courier_options: courier_options(&personnel.data),
            saving: self.is_saving(delivery.id),
            delivery,
        }))
    }

    /// Saves the edit form: assignment first, then status.
    pub async fn save(
        &self,
        delivery_id: u64,
        form: &DeliveryEditForm,
    ) -> Result<SaveOutcome, AppError> {
        let plan = form.plan()?;
        let _saving = self.saving.begin(delivery_id)?;

        if let Err(err) = apply_edit(self.backend(), &self.metrics, delivery_id, &plan).await {
            warn!(delivery_id, error = %err, "failed to save delivery changes");
            return Err(save_error(&err));
        }

        if let Some(status) = &plan.status {
            self.publish(BoardEvent::StatusUpdated {
                delivery_id,
                status: status.to_string(),
            });
        }
        info!(delivery_id, "delivery changes saved");

        Ok(SaveOutcome::new(delivery_id, &plan))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::DeliveryBoard;
    use crate::board::events::BoardEvent;
    use crate::error::AppError;
    use crate::models::assignment::AssignmentState;
    use crate::models::courier::Courier;
    use crate::models::delivery::{Delivery, DeliveryStatus};
    use crate::observability::metrics::Metrics;
    use crate::upstream::{DeliveryBackend, Endpoint, UpstreamError};
    use crate::upstream::memory::{BackendCall, InMemoryBackend};
    use crate::views::editor::DeliveryEditForm;

    /// Holds back active-delivery lookups for one search term.
    struct SlowSearch {
        inner: Arc<InMemoryBackend>,
        term: &'static str,
    }

    #[async_trait]
    impl DeliveryBackend for SlowSearch {
        async fn personnel(&self, search: Option<&str>) -> Result<Value, UpstreamError> {
            self.inner.personnel(search).await
        }

        async fn active_deliveries(&self, search: Option<&str>) -> Result<Value, UpstreamError> {
            if search == Some(self.term) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.inner.active_deliveries(search).await
        }

        async fn assign_courier(
            &self,
            delivery_id: u64,
            courier_id: Option<u64>,
        ) -> Result<(), UpstreamError> {
            self.inner.assign_courier(delivery_id, courier_id).await
        }

        async fn update_status(
            &self,
            delivery_id: u64,
            status: &DeliveryStatus,
        ) -> Result<(), UpstreamError> {
            self.inner.update_status(delivery_id, status).await
        }

        async fn order(&self, order_id: u64) -> Result<Value, UpstreamError> {
            self.inner.order(order_id).await
        }
    }

    fn setup() -> (Arc<InMemoryBackend>, DeliveryBoard) {
        let backend = Arc::new(
            InMemoryBackend::new()
                .with_personnel([Courier::new(3, "Amara")])
                .with_deliveries([Delivery::new(7, "TRK-7"), Delivery::new(8, "TRK-8")]),
        );
        let board = DeliveryBoard::new(backend.clone(), Metrics::new(), 16);
        (backend, board)
    }

    #[tokio::test]
    async fn load_fetches_filtered_deliveries_and_all_personnel() {
        let (backend, board) = setup();

        let table = board.load(Some("TRK-8")).await;

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.search.as_deref(), Some("TRK-8"));
        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.contains(&BackendCall::ActiveDeliveries {
            search: Some("TRK-8".to_string())
        }));
        assert!(calls.contains(&BackendCall::Personnel { search: None }));
    }

    #[tokio::test]
    async fn assignment_posts_once_then_refetches_once() {
        let (backend, board) = setup();
        board.load(None).await;
        backend.clear_calls();

        let outcome = board.assign(7, Some(3), None).await;

        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::AssignCourier {
                    delivery_id: 7,
                    courier_id: Some(3)
                },
                BackendCall::ActiveDeliveries { search: None },
            ]
        );
        assert!(matches!(outcome.state, AssignmentState::Succeeded { courier_id: Some(3), .. }));
        let row = outcome.table.row(7).unwrap();
        assert_eq!(row.courier, "Amara");
        assert_eq!(row.courier_id, Some(3));
    }

    #[tokio::test]
    async fn failed_assignment_still_refetches_and_marks_row() {
        let (backend, board) = setup();
        board.load(Some("TRK")).await;
        backend.clear_calls();
        backend.fail_next(Endpoint::AssignCourier, 422, Some("Courier is offline"));

        let outcome = board.assign(7, Some(3), Some("TRK")).await;

        assert_eq!(backend.calls().len(), 2);
        assert_eq!(
            backend.calls()[1],
            BackendCall::ActiveDeliveries {
                search: Some("TRK".to_string())
            }
        );
        let row = outcome.table.row(7).unwrap();
        assert!(matches!(
            &row.assignment,
            AssignmentState::Failed { message, .. } if message == "Courier is offline"
        ));
        assert_eq!(row.courier_id, None);
    }

    #[tokio::test]
    async fn unassign_sends_null_courier() {
        let (backend, board) = setup();
        board.assign(7, Some(3), None).await;
        backend.clear_calls();

        let outcome = board.assign(7, None, None).await;

        assert_eq!(
            backend.calls()[0],
            BackendCall::AssignCourier {
                delivery_id: 7,
                courier_id: None
            }
        );
        assert_eq!(outcome.table.row(7).unwrap().courier, "Unassigned");
    }

    #[tokio::test]
    async fn assignment_events_are_broadcast_in_order() {
        let (_backend, board) = setup();
        let mut events = board.subscribe();

        board.assign(8, Some(3), None).await;

        assert!(matches!(
            events.recv().await.unwrap(),
            BoardEvent::AssignmentRequested { delivery_id: 8, courier_id: Some(3), .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            BoardEvent::AssignmentSettled { delivery_id: 8, .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            BoardEvent::BoardRefreshed { deliveries: 2, .. }
        ));
    }

    #[tokio::test]
    async fn save_applies_both_writes_and_clears_saving_flag() {
        let (backend, board) = setup();
        let form = DeliveryEditForm {
            status: "Delivered".to_string(),
            courier_id: "3".to_string(),
            notes: String::new(),
        };

        let outcome = board.save(7, &form).await.unwrap();

        assert_eq!(outcome.redirect, "/deliveries/7");
        assert!(!board.is_saving(7));
        let delivery = backend.delivery(7).unwrap();
        assert_eq!(delivery.assigned_courier_id(), Some(3));
        assert_eq!(delivery.order_status.as_str(), "Delivered");
    }

    #[tokio::test]
    async fn failed_save_reports_server_message_and_clears_flag() {
        let (backend, board) = setup();
        backend.fail_next(Endpoint::AssignCourier, 409, Some("Delivery already closed"));
        let form = DeliveryEditForm {
            status: "Delivered".to_string(),
            courier_id: "3".to_string(),
            notes: String::new(),
        };

        let err = board.save(7, &form).await.unwrap_err();

        assert!(matches!(err, AppError::BadGateway(msg) if msg == "Delivery already closed"));
        assert!(!board.is_saving(7));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn edit_view_prefills_form() {
        let (_backend, board) = setup();
        board.assign(7, Some(3), None).await;

        let view = board.edit_view("#DEL-7").await.unwrap().unwrap();
        assert_eq!(view.form.courier_id, "3");
        assert_eq!(view.form.status, "Pending");
        assert_eq!(view.status_options.len(), 6);
        assert_eq!(view.courier_options.len(), 2);
        assert!(!view.saving);

        assert!(board.edit_view("TRK-99").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_searches_get_their_own_rows() {
        let (backend, _) = setup();
        let board = Arc::new(DeliveryBoard::new(
            Arc::new(SlowSearch {
                inner: backend,
                term: "TRK-7",
            }),
            Metrics::new(),
            16,
        ));

        let slow = tokio::spawn({
            let board = board.clone();
            async move { board.load(Some("TRK-7")).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fast = board.load(Some("TRK-8")).await;
        let slow = slow.await.unwrap();

        assert_eq!(slow.search.as_deref(), Some("TRK-7"));
        assert_eq!(slow.rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![7]);
        assert_eq!(fast.search.as_deref(), Some("TRK-8"));
        assert_eq!(fast.rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![8]);
        // Filtered loads leave the unfiltered list alone.
        assert!(board.deliveries().data.is_empty());
    }

    #[tokio::test]
    async fn assignment_refetch_keeps_callers_search() {
        let (backend, board) = setup();
        board.load(Some("TRK-8")).await;
        backend.clear_calls();

        let outcome = board.assign(7, Some(3), Some("TRK-7")).await;

        assert_eq!(
            backend.calls()[1],
            BackendCall::ActiveDeliveries {
                search: Some("TRK-7".to_string())
            }
        );
        assert_eq!(outcome.table.search.as_deref(), Some("TRK-7"));
        assert_eq!(outcome.table.row(7).unwrap().courier, "Amara");
    }

    #[tokio::test]
    async fn overview_keeps_map_collections_unfiltered() {
        let (_backend, board) = setup();

        let overview = board.overview(Some("TRK-8")).await;

        assert_eq!(overview.table.rows.len(), 1);
        assert_eq!(overview.deliveries.data.len(), 2);
        assert_eq!(overview.personnel.data.len(), 1);
    }

    #[tokio::test]
    async fn row_state_is_dropped_once_delivery_leaves_active_list() {
        let (backend, board) = setup();
        board.assign(7, Some(3), None).await;
        board.assign(8, Some(3), None).await;
        assert!(board.rows.contains_key(&7));

        backend.remove_delivery(7);
        board.refresh_deliveries().await;

        assert!(!board.rows.contains_key(&7));
        assert!(board.rows.contains_key(&8));
    }
}
