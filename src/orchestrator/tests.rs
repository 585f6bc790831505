//! Orchestrator Module Tests
//!
//! ## Test Scopes
//! - **Client**: error mapping for refused connections, remote errors and timeouts; ping.
//! - **Fan-out**: all three sub-tasks run, partial failures stay isolated,
//!   an empty image list never reaches the processing server.
//! - **Timeout asymmetry**: the front tier giving up does not stop the back tier.

#[cfg(test)]
mod tests {
    use crate::executor::TaskHandlerRegistry;
    use crate::orchestrator::{ClientError, ConsolidatedResult, ProcessingClient, TaskOrchestrator};
    use crate::protocol::{
        ProtocolError, TaskData, TaskKind, TaskRequest, read_value, write_message,
    };
    use crate::scraping::PageSummary;
    use crate::test_support::{start_processing, unused_addr};
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn client_for(addr: SocketAddr) -> ProcessingClient {
        ProcessingClient::new(addr.ip().to_string(), addr.port())
            .with_timeouts(Duration::from_secs(1), Duration::from_secs(3))
    }

    fn summary_with_images(count: usize) -> PageSummary {
        PageSummary {
            title: "Fixture".to_string(),
            image_urls: (0..count).map(|i| format!("http://a.test/{}.png", i)).collect(),
            images_count: count,
            ..PageSummary::default()
        }
    }

    /// Echoes what each handler was asked to do.
    fn echo_registry(image_batches: Arc<AtomicUsize>) -> Arc<TaskHandlerRegistry> {
        let registry = TaskHandlerRegistry::new();
        registry.register("screenshot", |url, data| async move {
            Ok(json!({"url": url, "width": data["width"], "placeholder": true}))
        });
        registry.register("performance", |_url, _data| async move {
            Ok(json!({"load_time_ms": 42.0, "status_code": 200}))
        });
        registry.register("images", move |_url, data| {
            let batches = image_batches.clone();
            async move {
                batches.fetch_add(1, Ordering::SeqCst);
                let urls = data["image_urls"].as_array().cloned().unwrap_or_default();
                Ok(json!(urls
                    .iter()
                    .map(|u| json!({"url": u, "format": "PNG"}))
                    .collect::<Vec<_>>()))
            }
        });
        registry
    }

    // ============================================================
    // TEST 1: ProcessingClient
    // ============================================================

    #[tokio::test]
    async fn test_client_reports_refused_connection() {
        let client = client_for(unused_addr().await);

        let result = client
            .send_task(TaskRequest::new(TaskKind::Performance, "http://a.test", TaskData::new()))
            .await;

        let error = result.unwrap_err();
        assert!(matches!(error, ClientError::ConnectionRefused { .. }));
        assert_eq!(error.to_string(), "Processing server unavailable (connection refused)");
    }

    #[tokio::test]
    async fn test_client_surfaces_remote_error() {
        let registry = TaskHandlerRegistry::new();
        registry.register("screenshot", |_url, _data| async move {
            Err(anyhow::anyhow!("renderer missing"))
        });
        let server = start_processing(registry, 1).await;

        let result = client_for(server.addr)
            .send_task(TaskRequest::new(TaskKind::Screenshot, "http://a.test", TaskData::new()))
            .await;

        match result {
            Err(ClientError::Remote(message)) => assert_eq!(message, "renderer missing"),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_rejects_contradictory_success_flag() {
        // ARRANGE: a peer that answers every request with success=false inside a success_response
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _request = read_value(&mut stream).await.unwrap();
            write_message(&mut stream, &json!({"type": "success_response", "success": false, "result": 1}))
                .await
                .unwrap();
        });

        // ACT
        let result = client_for(addr)
            .send_task(TaskRequest::new(TaskKind::Performance, "http://a.test", TaskData::new()))
            .await;

        // ASSERT
        assert!(matches!(
            result,
            Err(ClientError::Protocol(ProtocolError::MalformedPayload(_)))
        ));
    }

    #[tokio::test]
    async fn test_ping_reflects_server_availability() {
        let server = start_processing(TaskHandlerRegistry::new(), 1).await;

        assert!(client_for(server.addr).ping().await);
        assert!(!client_for(unused_addr().await).ping().await);
    }

    #[tokio::test]
    async fn test_request_shutdown_stops_server() {
        let server = start_processing(TaskHandlerRegistry::new(), 1).await;

        let ack = client_for(server.addr).request_shutdown().await.unwrap();
        let stopped = tokio::time::timeout(Duration::from_secs(5), server.task).await;

        assert_eq!(ack["message"], "Shutting down");
        assert!(stopped.unwrap().unwrap().is_ok());
    }

    // ============================================================
    // TEST 2: TaskOrchestrator fan-out / fan-in
    // ============================================================

    #[tokio::test]
    async fn test_process_collects_all_three_outcomes() {
        // ARRANGE
        let batches = Arc::new(AtomicUsize::new(0));
        let server = start_processing(echo_registry(batches.clone()), 4).await;
        let orchestrator = TaskOrchestrator::new(client_for(server.addr));

        // ACT: 8 images on the page, only 5 may be sent
        let result = orchestrator.process("http://a.test", &summary_with_images(8)).await;

        // ASSERT
        assert!(result.is_complete());
        assert_eq!(result.screenshot.as_ref().unwrap()["width"], 1920);
        assert_eq!(result.performance.as_ref().unwrap()["load_time_ms"], 42.0);
        assert_eq!(result.images.as_ref().unwrap().as_array().unwrap().len(), 5);
        assert_eq!(batches.load(Ordering::SeqCst), 1);

        let body = serde_json::to_value(&result).unwrap();
        assert_eq!(body["thumbnails"].as_array().unwrap().len(), 5);
        assert!(body.get("screenshot_error").is_none());
        assert!(body.get("performance_error").is_none());
        assert!(body.get("images_error").is_none());
    }

    #[tokio::test]
    async fn test_process_with_unreachable_back_tier() {
        // ARRANGE
        let orchestrator = TaskOrchestrator::new(client_for(unused_addr().await));
        let started = Instant::now();

        // ACT
        let result = orchestrator.process("http://a.test", &summary_with_images(2)).await;

        // ASSERT: every entry is an error, well within the per-sub-task bound
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(
            result.failures(),
            vec![TaskKind::Screenshot, TaskKind::Performance, TaskKind::Images]
        );

        let body = serde_json::to_value(&result).unwrap();
        assert!(body["screenshot"].is_null());
        assert!(body["performance"].is_null());
        assert_eq!(body["thumbnails"], json!([]));
        assert_eq!(
            body["images_error"],
            "Processing server unavailable (connection refused)"
        );
    }

    #[tokio::test]
    async fn test_empty_image_list_skips_processing_server() {
        // ARRANGE: a live server that counts image batches
        let batches = Arc::new(AtomicUsize::new(0));
        let server = start_processing(echo_registry(batches.clone()), 2).await;
        let orchestrator = TaskOrchestrator::new(client_for(server.addr));

        // ACT
        let result = orchestrator.process("http://a.test", &summary_with_images(0)).await;

        // ASSERT
        assert_eq!(result.images, Ok(json!([])));
        assert_eq!(batches.load(Ordering::SeqCst), 0);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn test_empty_image_list_succeeds_even_when_back_tier_is_down() {
        let orchestrator = TaskOrchestrator::new(client_for(unused_addr().await));

        let result = orchestrator.process("http://a.test", &PageSummary::default()).await;

        assert_eq!(result.images, Ok(json!([])));
        assert_eq!(result.failures(), vec![TaskKind::Screenshot, TaskKind::Performance]);
    }

    #[tokio::test]
    async fn test_one_failing_sub_task_leaves_siblings_intact() {
        let registry = echo_registry(Arc::new(AtomicUsize::new(0)));
        registry.register("screenshot", |_url, _data| async move {
            Err(anyhow::anyhow!("renderer crashed"))
        });
        let server = start_processing(registry, 2).await;
        let orchestrator = TaskOrchestrator::new(client_for(server.addr));

        let result = orchestrator.process("http://a.test", &summary_with_images(1)).await;
        let body = serde_json::to_value(&result).unwrap();

        assert!(body["screenshot"].is_null());
        assert_eq!(body["screenshot_error"], "renderer crashed");
        assert_eq!(body["performance"]["status_code"], 200);
        assert_eq!(body["thumbnails"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_performance_payload_requires_load_time() {
        let result = ConsolidatedResult::new(
            Ok(json!({"placeholder": true})),
            Ok(json!({"status_code": 200})),
            Ok(json!([])),
        );

        assert_eq!(
            result.performance,
            Err("Invalid performance data structure".to_string())
        );
        assert_eq!(result.failures(), vec![TaskKind::Performance]);
    }

    // ============================================================
    // TEST 3: Front-tier timeout vs back-tier execution
    // ============================================================

    #[tokio::test]
    async fn test_front_timeout_does_not_cancel_back_tier_work() {
        // ARRANGE: the handler takes 600ms, the client waits 200ms
        let finished = Arc::new(AtomicUsize::new(0));
        let finished_clone = finished.clone();
        let registry = TaskHandlerRegistry::new();
        registry.register("performance", move |_url, _data| {
            let finished = finished_clone.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(600)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"load_time_ms": 1.0}))
            }
        });
        let server = start_processing(registry, 1).await;
        let client = ProcessingClient::new(server.addr.ip().to_string(), server.addr.port())
            .with_timeouts(Duration::from_millis(100), Duration::from_millis(200));

        // ACT
        let result = client
            .send_task(TaskRequest::new(TaskKind::Performance, "http://a.test", TaskData::new()))
            .await;

        // ASSERT: the front tier gave up...
        assert!(matches!(result, Err(ClientError::ResponseTimeout { .. })));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        // ...while the back tier kept the slot and finished the work anyway
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
