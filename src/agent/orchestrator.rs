//! The agent loop: bounded alternation of model inference and tool execution.
//!
//! One run walks a small state machine. Start seeds the transcript with the
//! request and tool catalog; AwaitingModel calls the gateway; a tool-use
//! turn fans every requested call out concurrently and appends the results
//! before the next model call; a terminal text turn goes through the
//! normalizer. Turn-budget exhaustion or an unknown stop signal aborts into
//! a best-effort fallback plan built from whatever structured inputs are
//! already known, with no further model calls.
//!
//! Each transition takes the prior transcript and produces the next one;
//! nothing here mutates shared state besides the injected pool/cache
//! singletons.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};

use crate::cache::{request_key, PlanCache};
use crate::config::PlannerSettings;
use crate::llm::types::{ChatMessage, ContentBlock, StopReason, ToolDefinition};
use crate::llm::{LlmClient, MessagesResponse};
use crate::mcp_client::ToolRegistry;
use crate::plan::{extract_json_object, normalize_to_contract, ToolDiag, TripPlan};

use super::dispatch::ToolDispatcher;
use super::enrichment::{self, EnrichmentParams};
use super::errors::AgentError;
use super::types::{ParsedTripQuery, PlanRequest, ReviseRequest};

// ─── Turn classification ────────────────────────────────────────────────────

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ToolRequest {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// What a model turn asks the loop to do next.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ModelTurn {
    /// Terminal answer text; move to Finishing.
    Final(String),
    /// Execute these tools, then call the model again.
    ToolBatch(Vec<ToolRequest>),
    /// Unknown stop signal or unusable content; move to Aborted.
    Abort(&'static str),
}

pub(crate) fn classify_turn(response: &MessagesResponse) -> ModelTurn {
    match response.stop_reason {
        Some(StopReason::EndTurn) | None => match response.text() {
            Some(text) => ModelTurn::Final(text.to_string()),
            None => ModelTurn::Abort("final turn carried no text"),
        },
        Some(StopReason::ToolUse) => {
            let requests: Vec<ToolRequest> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| ToolRequest {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                })
                .collect();
            if requests.is_empty() {
                ModelTurn::Abort("tool_use turn carried no tool_use blocks")
            } else {
                ModelTurn::ToolBatch(requests)
            }
        }
        Some(StopReason::MaxTokens) => ModelTurn::Abort("model hit max_tokens"),
        Some(StopReason::StopSequence) | Some(StopReason::Other) => {
            ModelTurn::Abort("unexpected stop reason")
        }
    }
}

// ─── Tool batch execution ───────────────────────────────────────────────────

/// Run every tool call of one model turn concurrently (fan-out/fan-in) and
/// build the tool-result message, one block per request in request order,
/// correlated by call id.
pub(crate) async fn execute_tool_batch(
    dispatcher: &Arc<dyn ToolDispatcher>,
    requests: &[ToolRequest],
    diagnostics: &mut Vec<ToolDiag>,
) -> ChatMessage {
    tracing::info!(batch = requests.len(), "executing tool batch");

    let outcomes = join_all(requests.iter().map(|request| {
        let dispatcher = Arc::clone(dispatcher);
        async move { dispatcher.dispatch(&request.name, request.input.clone()).await }
    }))
    .await;

    let mut blocks = Vec::with_capacity(requests.len());
    for (request, (value, diag)) in requests.iter().zip(outcomes) {
        diagnostics.push(diag);
        let is_error = value.get("error").is_some();
        blocks.push(ContentBlock::ToolResult {
            tool_use_id: request.id.clone(),
            content: serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string()),
            is_error: is_error.then_some(true),
        });
    }

    ChatMessage::tool_results(blocks)
}

// ─── Orchestrator ───────────────────────────────────────────────────────────

/// Drives one request through the model/tool loop to a normalized plan.
///
/// All collaborators are constructor-injected with explicit lifecycles;
/// nothing here is ambient module state.
pub struct Orchestrator {
    llm: LlmClient,
    dispatcher: Arc<dyn ToolDispatcher>,
    registry: Arc<ToolRegistry>,
    cache: Arc<PlanCache>,
    settings: PlannerSettings,
}

impl Orchestrator {
    pub fn new(
        llm: LlmClient,
        dispatcher: Arc<dyn ToolDispatcher>,
        registry: Arc<ToolRegistry>,
        cache: Arc<PlanCache>,
        settings: PlannerSettings,
    ) -> Self {
        Self {
            llm,
            dispatcher,
            registry,
            cache,
            settings,
        }
    }

    /// Generate a plan for a request.
    ///
    /// `parsed` is the optional pre-extracted query from the upstream prompt
    /// parser; when present it drives enrichment instead of the model's own
    /// interpretation. Only rate-limit exhaustion and hard model-transport
    /// failures surface as errors — every other degradation yields a plan.
    pub async fn generate(
        &self,
        req: &PlanRequest,
        parsed: Option<&ParsedTripQuery>,
    ) -> Result<TripPlan, AgentError> {
        let key = request_key(&req.prompt, req.language.as_deref(), req.currency.as_deref());
        if let Some(cached) = self.cache.get(&key) {
            tracing::info!("serving plan from cache");
            return Ok(cached);
        }

        let tools = self.registry.llm_tool_definitions().await;
        let transcript = vec![ChatMessage::user_text(build_request_message(req))];
        let mut diagnostics: Vec<ToolDiag> = Vec::new();

        let final_text = self.run_loop(transcript, &tools, &mut diagnostics).await?;

        match final_text.as_deref().map(extract_json_object) {
            Some(Ok(obj)) => {
                let mut plan = normalize_to_contract(&obj);
                if let Some(parsed) = parsed {
                    enrichment::apply_parsed_query(&mut plan, parsed);
                }

                // A final answer with zero recorded tool usage means the
                // model fabricated the plan; one deterministic enrichment
                // pass backfills it with real data.
                if diagnostics.is_empty() && plan.metadata.tool_diagnostics.is_empty() {
                    tracing::warn!("model answered without tool usage, enriching directly");
                    let params = EnrichmentParams::resolve(parsed, &plan);
                    let enrich_diags =
                        enrichment::enrich(self.dispatcher.as_ref(), &params, &mut plan).await;
                    diagnostics.extend(enrich_diags);
                }

                plan.metadata.tool_diagnostics.extend(diagnostics);
                self.cache.put(&key, plan.clone());
                Ok(plan)
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "final output not decodable, building fallback plan");
                Ok(self.fallback_plan(req, parsed, diagnostics).await)
            }
            None => {
                tracing::warn!("run aborted, building fallback plan");
                Ok(self.fallback_plan(req, parsed, diagnostics).await)
            }
        }
    }

    /// Revise an existing plan with a new instruction.
    ///
    /// Runs the same loop seeded with the prior plan; the result keeps a
    /// `revisionOf` link to the plan it replaced. On an aborted run the
    /// prior plan comes back unchanged apart from the run's diagnostics.
    pub async fn revise(
        &self,
        prior: &TripPlan,
        req: &ReviseRequest,
    ) -> Result<TripPlan, AgentError> {
        let tools = self.registry.llm_tool_definitions().await;
        let prior_json =
            serde_json::to_string_pretty(prior).unwrap_or_else(|_| "{}".to_string());
        let transcript = vec![ChatMessage::user_text(format!(
            "Revise the following travel plan based on this instruction:\n\n\
             **Revision Request**: {}\n\n**Current Plan**:\n{}\n\n\
             Apply the requested changes using tools if needed, then return \
             the complete updated plan JSON.",
            req.instruction, prior_json
        ))];
        let mut diagnostics: Vec<ToolDiag> = Vec::new();

        let final_text = self.run_loop(transcript, &tools, &mut diagnostics).await?;

        let mut plan = match final_text.as_deref().map(extract_json_object) {
            Some(Ok(obj)) => normalize_to_contract(&obj),
            _ => {
                tracing::warn!("revision aborted, returning prior plan");
                prior.clone()
            }
        };

        if plan.metadata.revision_of.is_none() && plan.metadata.plan_id != prior.metadata.plan_id
        {
            plan.metadata.revision_of = Some(prior.metadata.plan_id.clone());
        }
        plan.metadata.tool_diagnostics.extend(diagnostics);
        Ok(plan)
    }

    // ─── Loop core ───────────────────────────────────────────────────────

    /// AwaitingModel ⇄ ExecutingTools until a terminal answer, an abort, or
    /// the turn budget runs out. Returns the terminal text, or `None` when
    /// the run aborted.
    async fn run_loop(
        &self,
        mut transcript: Vec<ChatMessage>,
        tools: &[ToolDefinition],
        diagnostics: &mut Vec<ToolDiag>,
    ) -> Result<Option<String>, AgentError> {
        let system = if self.settings.system_prompt.is_empty() {
            None
        } else {
            Some(self.settings.system_prompt.as_str())
        };

        for turn in 0..self.settings.max_turns {
            tracing::info!(turn = turn + 1, max = self.settings.max_turns, "model turn");

            let response = self.llm.send(&transcript, tools, system).await?;

            match classify_turn(&response) {
                ModelTurn::Final(text) => {
                    tracing::info!(turn = turn + 1, chars = text.len(), "terminal answer");
                    return Ok(Some(text));
                }
                ModelTurn::ToolBatch(requests) => {
                    transcript.push(ChatMessage::assistant(response.content.clone()));
                    let results_msg =
                        execute_tool_batch(&self.dispatcher, &requests, diagnostics).await;
                    transcript.push(results_msg);
                }
                ModelTurn::Abort(reason) => {
                    tracing::warn!(turn = turn + 1, reason, "aborting loop");
                    return Ok(None);
                }
            }
        }

        tracing::warn!(max_turns = self.settings.max_turns, "turn budget exhausted");
        Ok(None)
    }

    /// Best-effort plan when the loop could not produce one: a normalized
    /// empty skeleton backfilled by the deterministic enrichment pass.
    async fn fallback_plan(
        &self,
        req: &PlanRequest,
        parsed: Option<&ParsedTripQuery>,
        mut diagnostics: Vec<ToolDiag>,
    ) -> TripPlan {
        let skeleton = json!({
            "query": {"raw": req.prompt, "parsed": {}},
            "summary": "Unable to generate a full plan",
            "flights": {},
            "lodging": {},
            "transport": {},
            "weather": [],
            "days": [],
            "pricing": {"currency": req.currency},
            "metadata": {"warnings": ["plan assembled from direct search results"]},
        });
        let mut plan = normalize_to_contract(&skeleton);
        if let Some(parsed) = parsed {
            enrichment::apply_parsed_query(&mut plan, parsed);
        }

        let params = EnrichmentParams::resolve(parsed, &plan);
        let enrich_diags =
            enrichment::enrich(self.dispatcher.as_ref(), &params, &mut plan).await;
        diagnostics.extend(enrich_diags);

        plan.metadata.tool_diagnostics.extend(diagnostics);
        plan
    }
}

// ─── Request message ────────────────────────────────────────────────────────

fn build_request_message(req: &PlanRequest) -> String {
    format!(
        "Create a comprehensive travel plan for: {}\n\n\
         Language for responses: {}\nCurrency for pricing: {}",
        req.prompt,
        req.language.as_deref().unwrap_or("en"),
        req.currency.as_deref().unwrap_or("TRY"),
    )
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Barrier;

    fn response(stop: Option<StopReason>, content: Vec<ContentBlock>) -> MessagesResponse {
        // Deserialize round-trip keeps the struct literal out of sync worries.
        let stop_str = match stop {
            Some(StopReason::EndTurn) => Some("end_turn"),
            Some(StopReason::ToolUse) => Some("tool_use"),
            Some(StopReason::MaxTokens) => Some("max_tokens"),
            Some(StopReason::StopSequence) => Some("stop_sequence"),
            Some(StopReason::Other) => Some("pause_turn"),
            None => None,
        };
        serde_json::from_value(json!({
            "stop_reason": stop_str,
            "content": content,
        }))
        .unwrap()
    }

    #[test]
    fn test_classify_final_turn() {
        let resp = response(
            Some(StopReason::EndTurn),
            vec![ContentBlock::Text {
                text: "{\"summary\": \"done\"}".into(),
            }],
        );
        assert_eq!(
            classify_turn(&resp),
            ModelTurn::Final("{\"summary\": \"done\"}".into())
        );
    }

    #[test]
    fn test_classify_tool_batch() {
        let resp = response(
            Some(StopReason::ToolUse),
            vec![
                ContentBlock::Text {
                    text: "Checking flights and hotels.".into(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "flight_search".into(),
                    input: json!({"origin": "IST"}),
                },
                ContentBlock::ToolUse {
                    id: "toolu_2".into(),
                    name: "hotel_search".into(),
                    input: json!({"city": "Paris"}),
                },
            ],
        );
        match classify_turn(&resp) {
            ModelTurn::ToolBatch(requests) => {
                assert_eq!(requests.len(), 2);
                assert_eq!(requests[0].name, "flight_search");
                assert_eq!(requests[1].id, "toolu_2");
            }
            other => panic!("expected ToolBatch, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_abort_cases() {
        // end_turn without text
        let resp = response(Some(StopReason::EndTurn), vec![]);
        assert!(matches!(classify_turn(&resp), ModelTurn::Abort(_)));

        // unknown stop reason
        let resp = response(Some(StopReason::Other), vec![]);
        assert!(matches!(classify_turn(&resp), ModelTurn::Abort(_)));

        // tool_use without any tool_use block
        let resp = response(
            Some(StopReason::ToolUse),
            vec![ContentBlock::Text {
                text: "hmm".into(),
            }],
        );
        assert!(matches!(classify_turn(&resp), ModelTurn::Abort(_)));

        // max_tokens
        let resp = response(Some(StopReason::MaxTokens), vec![]);
        assert!(matches!(classify_turn(&resp), ModelTurn::Abort(_)));
    }

    /// Dispatcher that parks every call on a barrier: the batch completes
    /// only if all expected calls are in flight at the same time.
    struct BarrierDispatcher {
        barrier: Barrier,
    }

    #[async_trait]
    impl ToolDispatcher for BarrierDispatcher {
        async fn dispatch(&self, tool: &str, _arguments: Value) -> (Value, ToolDiag) {
            self.barrier.wait().await;
            (
                json!({"data": {"tool": tool}}),
                ToolDiag {
                    tool: tool.to_string(),
                    ok: true,
                    ms: Some(1),
                    error: None,
                },
            )
        }
    }

    #[tokio::test]
    async fn test_tool_batch_runs_concurrently_and_appends_all_results() {
        // Barrier of 2: if the two calls ran sequentially the first would
        // park forever and the timeout would trip.
        let dispatcher: Arc<dyn ToolDispatcher> = Arc::new(BarrierDispatcher {
            barrier: Barrier::new(2),
        });
        let requests = vec![
            ToolRequest {
                id: "toolu_1".into(),
                name: "flight_search".into(),
                input: json!({}),
            },
            ToolRequest {
                id: "toolu_2".into(),
                name: "hotel_search".into(),
                input: json!({}),
            },
        ];
        let mut diagnostics = Vec::new();

        let message = tokio::time::timeout(
            Duration::from_secs(2),
            execute_tool_batch(&dispatcher, &requests, &mut diagnostics),
        )
        .await
        .expect("both calls must be in flight before either resolves");

        assert_eq!(message.content.len(), 2, "exactly two tool-result turns");
        assert_eq!(diagnostics.len(), 2);
        match (&message.content[0], &message.content[1]) {
            (
                ContentBlock::ToolResult {
                    tool_use_id: id1,
                    is_error: err1,
                    ..
                },
                ContentBlock::ToolResult {
                    tool_use_id: id2, ..
                },
            ) => {
                // Results stay correlated by call id, in request order.
                assert_eq!(id1, "toolu_1");
                assert_eq!(id2, "toolu_2");
                assert!(err1.is_none());
            }
            other => panic!("expected two tool_result blocks, got {other:?}"),
        }
    }

    /// Dispatcher returning a fixed error for every call.
    struct FailingDispatcher;

    #[async_trait]
    impl ToolDispatcher for FailingDispatcher {
        async fn dispatch(&self, tool: &str, _arguments: Value) -> (Value, ToolDiag) {
            (
                json!({"error": "boom"}),
                ToolDiag {
                    tool: tool.to_string(),
                    ok: false,
                    ms: Some(1),
                    error: Some("boom".into()),
                },
            )
        }
    }

    #[tokio::test]
    async fn test_tool_batch_failure_becomes_error_result_not_abort() {
        let dispatcher: Arc<dyn ToolDispatcher> = Arc::new(FailingDispatcher);
        let requests = vec![ToolRequest {
            id: "toolu_9".into(),
            name: "flight_search".into(),
            input: json!({}),
        }];
        let mut diagnostics = Vec::new();

        let message = execute_tool_batch(&dispatcher, &requests, &mut diagnostics).await;

        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].ok);
        match &message.content[0] {
            ContentBlock::ToolResult {
                is_error, content, ..
            } => {
                assert_eq!(*is_error, Some(true));
                assert!(content.contains("boom"));
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn test_build_request_message_defaults() {
        let req = PlanRequest {
            prompt: "Istanbul to Paris, Nov 15-20, 2 adults".into(),
            language: None,
            currency: None,
        };
        let msg = build_request_message(&req);
        assert!(msg.contains("Istanbul to Paris"));
        assert!(msg.contains("Language for responses: en"));
        assert!(msg.contains("Currency for pricing: TRY"));
    }
}
