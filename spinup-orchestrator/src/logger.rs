use uuid::Uuid;

/// Action logger for provider-facing steps. Each step is an
/// `in_progress` event followed by a completion carrying the same log id.
pub fn log_event(action_type: &str, status: &str, instance_id: Option<&str>) -> Uuid {
    log_event_with_metadata(action_type, status, instance_id, None)
}

/// Log event with metadata (context info)
pub fn log_event_with_metadata(
    action_type: &str,
    status: &str,
    instance_id: Option<&str>,
    metadata: Option<serde_json::Value>,
) -> Uuid {
    let log_id = Uuid::new_v4();
    tracing::info!(
        log_id = %log_id,
        action_type,
        status,
        instance_id = instance_id.unwrap_or("-"),
        metadata = %metadata.unwrap_or(serde_json::Value::Null),
        "action"
    );
    log_id
}

/// Log event completion with duration
pub fn log_event_complete(
    log_id: Uuid,
    action_type: &str,
    status: &str,
    duration_ms: u128,
    error_message: Option<&str>,
) {
    match error_message {
        Some(error) => tracing::warn!(
            log_id = %log_id,
            action_type,
            status,
            duration_ms = duration_ms as u64,
            error,
            "action complete"
        ),
        None => tracing::info!(
            log_id = %log_id,
            action_type,
            status,
            duration_ms = duration_ms as u64,
            "action complete"
        ),
    }
}

/// Times `fut` as one action and logs its outcome.
pub async fn track<T, E, F>(action_type: &str, instance_id: Option<&str>, fut: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let started = std::time::Instant::now();
    let log_id = log_event(action_type, "in_progress", instance_id);
    let result = fut.await;
    let elapsed = started.elapsed().as_millis();
    match &result {
        Ok(_) => log_event_complete(log_id, action_type, "success", elapsed, None),
        Err(e) => log_event_complete(
            log_id,
            action_type,
            "failed",
            elapsed,
            Some(&e.to_string()),
        ),
    }
    result
}
