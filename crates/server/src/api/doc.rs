//! OpenAPI documentation aggregator, served via Scalar UI at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "oncall-server API",
        version = "0.1.0",
        description = "On-call rotation scheduling: trigger per-rotation workflows and query who is on call.",
    ),
    tags(
        (name = "Health", description = "Server readiness and redacted configuration"),
        (name = "Workflows", description = "Start, signal and list rotation scheduling workflows"),
        (name = "Rotations", description = "Effective on-call assignee queries"),
    ),
    paths(
        crate::api::health::health,
        crate::api::trigger::trigger_get,
        crate::api::trigger::trigger_post,
        crate::api::rotations::rotation_signal,
        crate::api::rotations::rotation_on_call,
        crate::api::rotations::workflows_list,
    ),
    components(schemas(
        crate::api::QueryErrorResponse,
        crate::api::trigger::TriggerBody,
        crate::api::trigger::IdList,
        crate::gateway::TriggerReport,
        crate::gateway::FailedStart,
    ))
)]
pub struct ApiDoc;
