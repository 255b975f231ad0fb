//! End-to-end pipeline tests over the public crate APIs: retrieval
//! corpus, scripted model, guardrail, caches and limiter wired together
//! the way a deployment would.

use dm_assistant_agent::{ConversationAnalyzer, DmPipeline, FunnelStage, Intent};
use dm_assistant_config::{CreatorConfig, Product};
use dm_assistant_core::{Document, LanguageModel, Turn};
use dm_assistant_llm::ScriptedBackend;
use dm_assistant_rag::{HybridRetriever, RetrieverConfig, SearchOptions};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn laura() -> CreatorConfig {
    CreatorConfig::new("laura-fit", "Laura")
        .with_product(
            Product::new("curso-ia", "Curso de IA", 99.0)
                .with_url("https://buy.stripe.com/curso-ia")
                .with_description("Automatiza tu negocio con inteligencia artificial"),
        )
        .with_product(Product::new("mentoria", "Mentoría 1:1", 250.0))
}

async fn indexed_retriever(creator: &CreatorConfig) -> Arc<HybridRetriever> {
    let retriever = Arc::new(HybridRetriever::new(RetrieverConfig::default()));
    for product in &creator.products {
        retriever
            .add_document(
                Document::new(product.id.clone(), product.as_document_text())
                    .with_metadata("creator_id", creator.creator_id.clone()),
            )
            .await
            .unwrap();
    }
    retriever
}

#[tokio::test]
async fn greeting_fast_path_works_without_a_model() {
    init_tracing();
    let creator = laura();
    let retriever = indexed_retriever(&creator).await;
    let pipeline = DmPipeline::new(creator, retriever);

    let outcome = pipeline.handle_message("follower-1", "Hola!", &[]).await;
    assert_eq!(outcome.intent.intent, Intent::Greeting);
    assert_eq!(outcome.intent.confidence, 0.85);
    assert!(outcome.reply.is_some());
}

#[tokio::test]
async fn fabricated_price_never_reaches_the_follower() {
    init_tracing();
    let creator = laura();
    let retriever = indexed_retriever(&creator).await;
    let backend: Arc<dyn LanguageModel> =
        Arc::new(ScriptedBackend::constant("El curso cuesta solo 150€, ¡aprovecha!"));
    let pipeline = DmPipeline::new(creator, retriever).with_llm(backend);

    let outcome = pipeline
        .handle_message("follower-1", "me interesa el curso", &[])
        .await;
    let reply = outcome.reply.unwrap();
    assert!(!reply.contains("150"), "unknown price leaked: {reply}");
}

#[tokio::test]
async fn known_price_with_checkout_link_passes() {
    init_tracing();
    let creator = laura();
    let retriever = indexed_retriever(&creator).await;
    let backend: Arc<dyn LanguageModel> = Arc::new(ScriptedBackend::constant(
        "El Curso de IA cuesta 99€. Puedes comprarlo aquí: https://buy.stripe.com/curso-ia",
    ));
    let pipeline = DmPipeline::new(creator, retriever).with_llm(backend);

    let outcome = pipeline
        .handle_message("follower-1", "me interesa el curso", &[])
        .await;
    let reply = outcome.reply.unwrap();
    assert!(reply.contains("99€"));
    assert!(reply.contains("buy.stripe.com"));
}

#[tokio::test]
async fn repeated_question_is_served_from_cache() {
    init_tracing();
    let creator = laura();
    let retriever = indexed_retriever(&creator).await;
    let backend: Arc<dyn LanguageModel> =
        Arc::new(ScriptedBackend::constant("¡Gracias por escribirme! 😊"));
    let pipeline = DmPipeline::new(creator, retriever).with_llm(backend);

    let first = pipeline.handle_message("f1", "buenas!", &[]).await;
    let second = pipeline.handle_message("f2", "buenas!", &[]).await;
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.reply, second.reply);
}

#[tokio::test]
async fn retrieval_finds_the_product_for_a_price_question() {
    init_tracing();
    let creator = laura();
    let retriever = indexed_retriever(&creator).await;

    let options = SearchOptions::hybrid().with_namespace(&creator.creator_id);
    let results = retriever.search("cuánto cuesta el curso", 3, &options).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().any(|r| r.doc_id == "curso-ia"));
}

#[tokio::test]
async fn conversation_funnel_scenario() {
    let turns = vec![
        Turn::user("quiero comprar ya"),
        Turn::assistant("¡Genial! Te cuento cómo."),
        Turn::user("es muy caro"),
        Turn::user("cuánto cuesta"),
    ];
    let analysis = ConversationAnalyzer::new().analyze(&turns);

    assert_eq!(analysis.total_messages, 4);
    assert_eq!(analysis.user_turns, 3);
    assert_eq!(
        analysis.intent_distribution.get(&Intent::InterestStrong),
        Some(&1)
    );
    assert_eq!(analysis.intent_distribution.get(&Intent::Objection), Some(&1));
    assert_eq!(
        analysis.intent_distribution.get(&Intent::QuestionProduct),
        Some(&1)
    );
    assert!((analysis.purchase_intent_score - 4.0 / 6.0).abs() < 1e-9);
    assert_eq!(analysis.funnel_stage, FunnelStage::Consideration);
}

#[tokio::test]
async fn escalation_hands_off_and_alerts() {
    use dm_assistant_core::{AlertEvent, AlertSink};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AlertEvent>>,
    }

    #[async_trait::async_trait]
    impl AlertSink for RecordingSink {
        async fn notify(&self, event: AlertEvent) {
            self.events.lock().push(event);
        }
    }

    let creator = laura();
    let retriever = indexed_retriever(&creator).await;
    let sink = Arc::new(RecordingSink::default());
    let sink_handle: Arc<dyn AlertSink> = sink.clone();
    let pipeline = DmPipeline::new(creator, retriever).with_alert_sink(sink_handle);

    let outcome = pipeline
        .handle_message("f1", "necesito hablar con una persona", &[])
        .await;
    assert_eq!(outcome.intent.intent, Intent::Escalation);
    assert!(outcome.reply.unwrap().contains("Laura"));

    let events = sink.events.lock();
    assert!(matches!(events.as_slice(), [AlertEvent::Escalation { .. }]));
}
