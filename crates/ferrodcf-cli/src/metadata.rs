use ferrodcf_core::{EnvelopeMeta, ProviderId, ValidationError};
use uuid::Uuid;

/// Identifiers and bookkeeping for one `ferrodcf` invocation.
///
/// The request id is a hyphenated UUID v4; the trace id is the same kind of
/// UUID in simple (32 hex) form so it satisfies the envelope's trace-id rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    request_id: Uuid,
    trace_id: Uuid,
    source_chain: Vec<ProviderId>,
    latency_ms: u64,
    cache_hit: bool,
    warnings: Vec<String>,
}

impl Metadata {
    pub fn new(
        source_chain: Vec<ProviderId>,
        latency_ms: u64,
        cache_hit: bool,
    ) -> Result<Self, ValidationError> {
        if source_chain.is_empty() {
            return Err(ValidationError::EmptySourceChain);
        }
        Ok(Self {
            request_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            source_chain,
            latency_ms,
            cache_hit,
            warnings: Vec::new(),
        })
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn request_id(&self) -> String {
        self.request_id.hyphenated().to_string()
    }

    pub fn trace_id(&self) -> String {
        self.trace_id.simple().to_string()
    }

    pub fn into_envelope_meta(self) -> Result<EnvelopeMeta, ValidationError> {
        let mut meta = EnvelopeMeta::new(
            self.request_id(),
            self.source_chain,
            self.latency_ms,
            self.cache_hit,
        )?
        .with_trace_id(self.trace_id.simple().to_string())?;
        meta.warnings = self.warnings;
        Ok(meta)
    }
}
