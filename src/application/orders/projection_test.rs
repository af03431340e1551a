#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use crate::adapters::{
        InMemoryMessageBus, InMemoryOrderApi, ScriptedTransport, StaticIdentityDecoder,
    };
    use crate::application::connection::{ConnectionHandle, ConnectionManager, ReconnectPolicy};
    use crate::application::orders::{OrderProjection, OrderProjectionConfig};
    use crate::domain::foundation::{Credential, ErrorCode, OrderId, Timestamp, UserId};
    use crate::domain::orders::{CustomerRef, OrderListView, OrderStatus, OrderUpdate, PendingOrder};
    use crate::domain::realtime::{BusMessage, InboundMessage};
    use crate::ports::{MessagePublisher, MessageSubscriber, OrderApiError, OrderDecision};

    const WAIT: Duration = Duration::from_secs(2);

    struct Harness {
        transport: Arc<ScriptedTransport>,
        bus: Arc<InMemoryMessageBus<BusMessage>>,
        api: Arc<InMemoryOrderApi>,
        connection: ConnectionHandle,
        projection: OrderProjection,
    }

    impl Harness {
        fn new(api: InMemoryOrderApi) -> Self {
            Self::with_tick(api, Duration::from_secs(3600))
        }

        fn with_tick(api: InMemoryOrderApi, tick: Duration) -> Self {
            let transport = Arc::new(ScriptedTransport::new());
            let bus = Arc::new(InMemoryMessageBus::<BusMessage>::new());
            let api = Arc::new(api);
            let decoder = Arc::new(
                StaticIdentityDecoder::new()
                    .with_token("token-u1", "u1")
                    .with_token("token-u2", "u2"),
            );

            let connection = ConnectionManager::spawn(
                transport.clone(),
                bus.clone(),
                decoder,
                ReconnectPolicy::flat(Duration::from_millis(20)),
            );
            let projection = OrderProjection::new(
                api.clone(),
                connection.clone(),
                bus.clone(),
                OrderProjectionConfig::default().with_tick_interval(tick),
            );

            Self {
                transport,
                bus,
                api,
                connection,
                projection,
            }
        }

        fn publish(&self, message: InboundMessage) {
            self.bus.publish(&BusMessage::Inbound(message));
        }

        fn ids(&self) -> Vec<String> {
            self.projection
                .orders()
                .iter()
                .map(|o| o.id.to_string())
                .collect()
        }
    }

    fn order_expiring_in(id: &str, millis: i64) -> PendingOrder {
        PendingOrder {
            id: OrderId::new(id).unwrap(),
            customer: CustomerRef::Id(UserId::new("c1").unwrap()),
            dishes: Vec::new(),
            number_of_people: 2,
            total: 25.0,
            timer_expiry: Timestamp::now().plus_millis(millis),
        }
    }

    fn live(id: &str) -> PendingOrder {
        order_expiring_in(id, 600_000)
    }

    fn oid(id: &str) -> OrderId {
        OrderId::new(id).unwrap()
    }

    fn update(id: &str, status: OrderStatus) -> InboundMessage {
        InboundMessage::OrderUpdate(OrderUpdate {
            id: oid(id),
            status,
            timer_expiry: None,
            order: None,
        })
    }

    async fn wait_for_view(
        projection: &OrderProjection,
        predicate: impl FnMut(&OrderListView) -> bool,
    ) {
        let mut views = projection.watch();
        timeout(WAIT, views.wait_for(predicate))
            .await
            .expect("timed out waiting for the order view")
            .unwrap();
    }

    // ════════════════════════════════════════════════════════════════════════
    // start
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn start_seeds_from_snapshot_skipping_expired_orders() {
        let api = InMemoryOrderApi::new()
            .with_pending(vec![live("o1"), order_expiring_in("o2", -1_000), live("o3")]);
        let h = Harness::new(api);

        let merged = h.projection.start(Credential::new("token-u1")).await.unwrap();

        assert_eq!(merged, 2);
        assert_eq!(h.ids(), vec!["o1", "o3"]);
        assert_eq!(h.api.snapshot_calls(), 1);
    }

    #[tokio::test]
    async fn start_connects_the_shared_socket_and_subscribes() {
        let h = Harness::new(InMemoryOrderApi::new());

        h.projection.start(Credential::new("token-u1")).await.unwrap();

        let peer = timeout(WAIT, h.transport.next_peer()).await.unwrap().unwrap();
        assert_eq!(peer.wait_for_sent(1).await.len(), 1);
        assert_eq!(h.bus.subscriber_count(), 1);
        assert!(h.projection.is_running());
    }

    #[tokio::test]
    async fn starting_twice_subscribes_once() {
        let h = Harness::new(InMemoryOrderApi::new());

        h.projection.start(Credential::new("token-u1")).await.unwrap();
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        assert_eq!(h.bus.subscriber_count(), 1);
        assert_eq!(h.api.snapshot_calls(), 2);
    }

    #[tokio::test]
    async fn undecodable_credential_fails_start() {
        let h = Harness::new(InMemoryOrderApi::new());

        let err = h.projection.start(Credential::new("nope")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(h.api.snapshot_calls(), 0);
    }

    #[tokio::test]
    async fn snapshot_failure_is_surfaced_but_stream_still_applies() {
        let api = InMemoryOrderApi::new();
        api.fail_next_snapshot(OrderApiError::Network("down".into()));
        let h = Harness::new(api);

        let err = h.projection.start(Credential::new("token-u1")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamUnavailable);

        h.publish(InboundMessage::NewOrder(live("o1")));
        assert_eq!(h.ids(), vec!["o1"]);
    }

    #[tokio::test]
    async fn snapshot_merges_with_streamed_orders_by_id() {
        let api = InMemoryOrderApi::new().with_pending(vec![live("o1"), live("o2")]);
        let h = Harness::new(api);
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        // Same ids again: no duplicates
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        assert_eq!(h.ids(), vec!["o1", "o2"]);
    }

    #[tokio::test]
    async fn new_credential_clears_the_previous_identitys_orders() {
        let h = Harness::new(InMemoryOrderApi::new());
        h.projection.start(Credential::new("token-u1")).await.unwrap();
        h.publish(InboundMessage::NewOrder(live("o1")));

        h.projection.start(Credential::new("token-u2")).await.unwrap();

        assert!(h.projection.orders().is_empty());
    }

    #[tokio::test]
    async fn rejected_credential_leaves_the_running_session_untouched() {
        let api = InMemoryOrderApi::new().with_pending(vec![live("o1")]);
        let h = Harness::new(api);
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        let err = h.projection.start(Credential::new("garbage")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(h.ids(), vec!["o1"]);

        h.projection.accept(&oid("o1")).await.unwrap();
        assert_eq!(h.api.last_credential(), Some(Credential::new("token-u1")));
        assert_eq!(h.api.snapshot_calls(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════
    // frames racing the snapshot
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn status_update_during_snapshot_fetch_is_not_undone() {
        let api = InMemoryOrderApi::new().with_pending(vec![live("o1"), live("o2")]);
        api.hold_snapshots();
        let h = Harness::new(api);

        let (merged, ()) = tokio::join!(h.projection.start(Credential::new("token-u1")), async {
            h.api.wait_for_snapshot_calls(1).await;
            h.publish(update("o1", OrderStatus::Accepted));
            h.api.release_snapshots();
        });

        assert_eq!(merged.unwrap(), 1);
        assert_eq!(h.ids(), vec!["o2"]);
    }

    #[tokio::test]
    async fn decision_during_snapshot_fetch_is_not_undone() {
        let api = InMemoryOrderApi::new().with_pending(vec![live("o1")]);
        api.hold_snapshots();
        let h = Harness::new(api);

        let (merged, accepted) = tokio::join!(h.projection.start(Credential::new("token-u1")), async {
            h.api.wait_for_snapshot_calls(1).await;
            let accepted = h.projection.accept(&oid("o1")).await;
            h.api.release_snapshots();
            accepted
        });

        accepted.unwrap();
        assert_eq!(merged.unwrap(), 0);
        assert!(h.projection.orders().is_empty());
    }

    #[tokio::test]
    async fn streamed_order_during_snapshot_fetch_keeps_its_content() {
        let api = InMemoryOrderApi::new().with_pending(vec![live("o1"), live("o2")]);
        api.hold_snapshots();
        let h = Harness::new(api);
        let mut fresher = live("o1");
        fresher.total = 99.0;

        let (merged, ()) = tokio::join!(h.projection.start(Credential::new("token-u1")), async {
            h.api.wait_for_snapshot_calls(1).await;
            h.publish(InboundMessage::NewOrder(fresher.clone()));
            h.api.release_snapshots();
        });

        assert_eq!(merged.unwrap(), 1);
        assert_eq!(h.ids(), vec!["o1", "o2"]);
        assert_eq!(h.projection.orders()[0].total, 99.0);
    }

    #[tokio::test]
    async fn snapshot_for_a_replaced_credential_is_discarded() {
        let api = InMemoryOrderApi::new().with_pending(vec![live("o1")]);
        api.hold_snapshots();
        let h = Harness::new(api);

        let (first, second, ()) = tokio::join!(
            h.projection.start(Credential::new("token-u1")),
            async {
                h.api.wait_for_snapshot_calls(1).await;
                h.projection.start(Credential::new("token-u2")).await
            },
            async {
                h.api.wait_for_snapshot_calls(2).await;
                h.api.release_snapshots();
            },
        );

        assert_eq!(first.unwrap(), 0);
        assert_eq!(second.unwrap(), 1);
        assert_eq!(h.ids(), vec!["o1"]);
    }

    // ════════════════════════════════════════════════════════════════════════
    // stream frames
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn new_orders_go_to_the_front() {
        let api = InMemoryOrderApi::new().with_pending(vec![live("o1")]);
        let h = Harness::new(api);
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        h.publish(InboundMessage::NewOrder(live("o2")));
        h.publish(InboundMessage::NewOrder(live("o3")));

        assert_eq!(h.ids(), vec!["o3", "o2", "o1"]);
    }

    #[tokio::test]
    async fn repeated_new_order_keeps_one_entry_with_latest_content() {
        let h = Harness::new(InMemoryOrderApi::new());
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        let mut newer = live("o1");
        newer.total = 99.0;
        h.publish(InboundMessage::NewOrder(live("o1")));
        h.publish(InboundMessage::NewOrder(newer));

        let orders = h.projection.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total, 99.0);
    }

    #[tokio::test]
    async fn non_pending_update_removes_the_order() {
        let h = Harness::new(InMemoryOrderApi::new().with_pending(vec![live("o1"), live("o2")]));
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        h.publish(update("o1", OrderStatus::Accepted));

        assert_eq!(h.ids(), vec!["o2"]);
    }

    #[tokio::test]
    async fn pending_update_moves_the_timer() {
        let h = Harness::new(InMemoryOrderApi::new().with_pending(vec![live("o1")]));
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        let reset = Timestamp::now().plus_millis(900_000);
        h.publish(InboundMessage::OrderUpdate(OrderUpdate {
            id: oid("o1"),
            status: OrderStatus::Pending,
            timer_expiry: Some(reset),
            order: None,
        }));

        assert_eq!(h.projection.orders()[0].timer_expiry, reset);
    }

    #[tokio::test]
    async fn connection_events_and_chat_are_ignored() {
        let h = Harness::new(InMemoryOrderApi::new().with_pending(vec![live("o1")]));
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        h.publish(InboundMessage::Other {
            kind: "TYPING".into(),
            payload: json!({}),
        });

        assert_eq!(h.ids(), vec!["o1"]);
    }

    #[tokio::test]
    async fn frames_arriving_over_the_socket_reach_the_projection() {
        let h = Harness::new(InMemoryOrderApi::new());
        h.projection.start(Credential::new("token-u1")).await.unwrap();
        let peer = timeout(WAIT, h.transport.next_peer()).await.unwrap().unwrap();
        peer.wait_for_sent(1).await;

        peer.deliver(
            json!({
                "type": "NEW_ORDER",
                "order": {
                    "_id": "o7",
                    "customer": "c1",
                    "dishes": [],
                    "numberOfPeople": 1,
                    "total": 12.0,
                    "timerExpiry": Timestamp::now().plus_millis(600_000)
                }
            })
            .to_string(),
        )
        .await;

        wait_for_view(&h.projection, |view| view.ids() == vec![oid("o7")]).await;
    }

    // ════════════════════════════════════════════════════════════════════════
    // accept / reject
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn accept_removes_the_order_after_success() {
        let h = Harness::new(InMemoryOrderApi::new().with_pending(vec![live("o1"), live("o2")]));
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        h.projection.accept(&oid("o1")).await.unwrap();

        assert_eq!(h.ids(), vec!["o2"]);
        assert_eq!(h.api.decisions(), vec![(oid("o1"), OrderDecision::Accept)]);
        assert_eq!(h.api.last_credential(), Some(Credential::new("token-u1")));
    }

    #[tokio::test]
    async fn reject_removes_the_order_after_success() {
        let h = Harness::new(InMemoryOrderApi::new().with_pending(vec![live("o1")]));
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        h.projection.reject(&oid("o1")).await.unwrap();

        assert!(h.projection.orders().is_empty());
        assert_eq!(h.api.decisions(), vec![(oid("o1"), OrderDecision::Reject)]);
    }

    #[tokio::test]
    async fn failed_decision_keeps_the_order() {
        let h = Harness::new(InMemoryOrderApi::new().with_pending(vec![live("o1")]));
        h.projection.start(Credential::new("token-u1")).await.unwrap();
        h.api.fail_next_decision(OrderApiError::Status {
            status: 500,
            body: "boom".into(),
        });

        let err = h.projection.accept(&oid("o1")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::UpstreamRejected);
        assert_eq!(err.details.get("order_id"), Some(&"o1".to_string()));
        assert_eq!(h.ids(), vec!["o1"]);

        // Caller may retry
        h.projection.accept(&oid("o1")).await.unwrap();
        assert!(h.projection.orders().is_empty());
    }

    #[tokio::test]
    async fn decision_before_start_is_unauthorized() {
        let h = Harness::new(InMemoryOrderApi::new());

        let err = h.projection.accept(&oid("o1")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert!(h.api.decisions().is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════
    // expiry
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn sweep_removes_only_expired_orders() {
        let h = Harness::new(InMemoryOrderApi::new());
        h.projection.start(Credential::new("token-u1")).await.unwrap();
        h.publish(InboundMessage::NewOrder(order_expiring_in("soon", 5_000)));
        h.publish(InboundMessage::NewOrder(live("later")));

        let expired = h.projection.sweep(&Timestamp::now().plus_millis(10_000));

        assert_eq!(expired, vec![oid("soon")]);
        assert_eq!(h.ids(), vec!["later"]);
    }

    #[tokio::test]
    async fn tick_drops_orders_whose_timer_ran_out() {
        let h = Harness::with_tick(InMemoryOrderApi::new(), Duration::from_millis(20));
        h.projection.start(Credential::new("token-u1")).await.unwrap();
        h.publish(InboundMessage::NewOrder(order_expiring_in("brief", 80)));
        h.publish(InboundMessage::NewOrder(live("long")));

        wait_for_view(&h.projection, |view| view.ids() == vec![oid("long")]).await;
        assert_eq!(h.ids(), vec!["long"]);
    }

    #[tokio::test]
    async fn already_expired_new_order_is_gone_after_next_tick() {
        let h = Harness::with_tick(InMemoryOrderApi::new(), Duration::from_millis(20));
        h.projection.start(Credential::new("token-u1")).await.unwrap();

        h.publish(InboundMessage::NewOrder(order_expiring_in("stale", -1)));

        wait_for_view(&h.projection, |view| view.orders.is_empty()).await;
    }

    #[tokio::test]
    async fn view_carries_countdown_labels() {
        let h = Harness::new(InMemoryOrderApi::new());
        h.projection.start(Credential::new("token-u1")).await.unwrap();
        let mut order = live("o1");
        let now = Timestamp::now();
        order.timer_expiry = now.plus_millis(125_000);
        h.publish(InboundMessage::NewOrder(order));

        let view = h.projection.view_at(&now);

        assert_eq!(view.orders[0].remaining, "2m 5s");
        assert_eq!(h.projection.view_at(&now.plus_millis(125_000)).orders[0].remaining, "Expired");
    }

    // ════════════════════════════════════════════════════════════════════════
    // shutdown
    // ════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn shutdown_stops_following_but_keeps_the_connection() {
        let h = Harness::new(InMemoryOrderApi::new());
        h.projection.start(Credential::new("token-u1")).await.unwrap();
        let _peer = timeout(WAIT, h.transport.next_peer()).await.unwrap().unwrap();
        let mut state = h.connection.state_changes();
        timeout(WAIT, state.wait_for(|s| s.is_connected()))
            .await
            .unwrap()
            .unwrap();

        h.projection.shutdown().await;
        h.publish(InboundMessage::NewOrder(live("late")));

        assert!(h.projection.orders().is_empty());
        assert_eq!(h.bus.subscriber_count(), 0);
        assert!(!h.projection.is_running());
        assert!(h.connection.is_connected());
    }

    #[tokio::test]
    async fn shutdown_without_start_is_a_no_op() {
        let h = Harness::new(InMemoryOrderApi::new());
        h.projection.shutdown().await;
        assert!(!h.projection.is_running());
    }
}
