//! Issuer (emissor) inference.
//!
//! Inference runs an ordered list of [`IssuerStrategy`] objects over a page
//! layout. Each strategy proposes scored candidates; the first strategy whose
//! best candidate scores above zero decides the issuer. When none does, the
//! highest-scoring candidate seen across all strategies is used. Batch-wide
//! and per-CNPJ overrides are resolved before any strategy runs.

use tracing::{debug, trace};

use crate::code::format_cnpj;
use crate::models::{
    DocsortConfig, InferenceConfig, IssuerConfig, IssuerResolution, Vocabulary, UNKNOWN_ISSUER,
};
use crate::ocr::{OcrLine, PageLayout};

use super::patterns::{CNPJ_LABEL, EDGE_PUNCTUATION};
use super::text::{collapse_whitespace, digit_ratio, digits_only, fold_accents, fold_upper, slugify, EMPTY_SLUG};

/// Marker-anchor window when the layout has no geometry.
const MARKER_WINDOW_LINES: usize = 5;

/// Lines after an issuer label that may carry the name.
const LABEL_FOLLOW_LINES: usize = 3;

/// A cleaned candidate name and its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub score: i32,
}

/// Outcome of issuer inference for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerInference {
    /// Slugified name or [`UNKNOWN_ISSUER`].
    pub issuer: String,
    pub resolution: IssuerResolution,
    /// Winning candidate, when a strategy produced it.
    pub candidate: Option<Candidate>,
}

impl IssuerInference {
    pub fn unresolved() -> Self {
        Self {
            issuer: UNKNOWN_ISSUER.to_string(),
            resolution: IssuerResolution::Unresolved,
            candidate: None,
        }
    }

    /// Named resolution that bypasses the strategies.
    pub fn named(name: &str, resolution: IssuerResolution) -> Self {
        let slug = slugify(name);
        if slug == EMPTY_SLUG {
            return Self::unresolved();
        }
        Self {
            issuer: slug,
            resolution,
            candidate: None,
        }
    }
}

/// Inputs shared by all strategies.
pub struct InferenceContext<'a> {
    pub layout: &'a PageLayout,
    /// 14-digit CNPJ taken from the access key.
    pub cnpj: Option<&'a str>,
    pub vocabulary: &'a Vocabulary,
    pub settings: &'a InferenceConfig,
}

impl InferenceContext<'_> {
    fn lines(&self) -> &[OcrLine] {
        &self.layout.lines
    }

    fn score(&self, raw: &str) -> Option<Candidate> {
        score_candidate(raw, self.vocabulary, self.settings)
    }

    fn center_tolerance(&self) -> f32 {
        (self.layout.width as f32 * self.settings.center_tolerance_ratio)
            .max(self.settings.min_center_tolerance)
    }
}

/// One step of the fallback chain.
pub trait IssuerStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolution reported when this strategy decides.
    fn resolution(&self) -> IssuerResolution;

    fn candidates(&self, ctx: &InferenceContext<'_>) -> Vec<Candidate>;
}

/// Lines just above a CNPJ anchor.
///
/// Anchors are the lines carrying the key's CNPJ when it is known and
/// printed; otherwise every line with a "CNPJ" label.
pub struct CnpjAnchor;

impl CnpjAnchor {
    fn anchors(ctx: &InferenceContext<'_>) -> Vec<usize> {
        let lines = ctx.lines();

        if let Some(cnpj) = ctx.cnpj {
            let formatted = format_cnpj(cnpj);
            let known: Vec<usize> = lines
                .iter()
                .enumerate()
                .filter(|(_, line)| {
                    let text = line.text();
                    digits_only(&text).contains(cnpj)
                        || formatted.as_deref().is_some_and(|f| text.contains(f))
                })
                .map(|(idx, _)| idx)
                .collect();
            if !known.is_empty() {
                return known;
            }
        }

        lines
            .iter()
            .enumerate()
            .filter(|(_, line)| CNPJ_LABEL.is_match(&fold_accents(&line.text())))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Words on the anchor line before the label or the number itself.
    fn leading_text(line: &OcrLine, limit: Option<f32>) -> String {
        line.words
            .iter()
            .take_while(|w| {
                !fold_upper(&w.text).contains("CNPJ") && digits_only(&w.text).len() < 8
            })
            .filter(|w| limit.is_none_or(|l| w.center_x() <= l))
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl IssuerStrategy for CnpjAnchor {
    fn name(&self) -> &'static str {
        "cnpj_anchor"
    }

    fn resolution(&self) -> IssuerResolution {
        IssuerResolution::Anchor1Match
    }

    fn candidates(&self, ctx: &InferenceContext<'_>) -> Vec<Candidate> {
        let lines = ctx.lines();
        let mut out = Vec::new();

        for idx in Self::anchors(ctx) {
            let anchor = &lines[idx];
            let limit = anchor.median_center().map(|c| c + ctx.center_tolerance());
            trace!("CNPJ anchor at line {} (limit {:?})", idx, limit);

            out.extend(ctx.score(&Self::leading_text(anchor, limit)));

            let start = idx.saturating_sub(ctx.settings.anchor_window);
            for line in lines[start..idx].iter().rev() {
                if !line.same_paragraph(anchor) {
                    break;
                }
                let text = match limit {
                    Some(l) => line.text_left_of(l),
                    None => line.text(),
                };
                out.extend(ctx.score(&text));
            }
        }

        out
    }
}

/// Lines above the topmost transport-document title.
pub struct MarkerAnchor;

impl IssuerStrategy for MarkerAnchor {
    fn name(&self) -> &'static str {
        "marker_anchor"
    }

    fn resolution(&self) -> IssuerResolution {
        IssuerResolution::Anchor2Match
    }

    fn candidates(&self, ctx: &InferenceContext<'_>) -> Vec<Candidate> {
        let lines = ctx.lines();
        let markers = &ctx.vocabulary.marker_tokens;

        let marker = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| {
                let upper = fold_upper(&line.text());
                markers.iter().any(|m| upper.contains(m.as_str()))
            })
            .min_by_key(|(idx, line)| (line.top(), *idx));

        let Some((idx, marker)) = marker else {
            return Vec::new();
        };

        if marker.has_geometry() {
            let top = marker.top();
            lines
                .iter()
                .filter(|l| l.has_geometry() && l.top() < top && top - l.top() <= ctx.settings.marker_window_px)
                .filter_map(|l| ctx.score(&l.text()))
                .collect()
        } else {
            let start = idx.saturating_sub(MARKER_WINDOW_LINES);
            lines[start..idx]
                .iter()
                .filter_map(|l| ctx.score(&l.text()))
                .collect()
        }
    }
}

/// Lines following an EMITENTE / EMISSOR / PRESTADOR label.
pub struct LabelBlock;

impl IssuerStrategy for LabelBlock {
    fn name(&self) -> &'static str {
        "label_block"
    }

    fn resolution(&self) -> IssuerResolution {
        IssuerResolution::LabelMatch
    }

    fn candidates(&self, ctx: &InferenceContext<'_>) -> Vec<Candidate> {
        let lines = ctx.lines();
        let labels = &ctx.vocabulary.issuer_labels;
        let mut out = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let text = line.text();
            let upper = fold_upper(&text);
            let labelled = upper
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|word| labels.iter().any(|l| l == word));
            if !labelled {
                continue;
            }

            // "EMITENTE: ACME LTDA" carries the name on the label line itself.
            let folded = collapse_whitespace(&fold_accents(&text));
            if let Some(rest) = strip_label_prefix(&EDGE_PUNCTUATION.replace_all(&folded, ""), ctx.vocabulary) {
                out.extend(ctx.score(&rest));
            }

            let end = (idx + 1 + LABEL_FOLLOW_LINES).min(lines.len());
            for next in &lines[idx + 1..end] {
                out.extend(ctx.score(&next.text()));
            }
        }

        out
    }
}

/// Best sufficiently long line near the top of the page.
pub struct TopOfPage;

impl IssuerStrategy for TopOfPage {
    fn name(&self) -> &'static str {
        "top_of_page"
    }

    fn resolution(&self) -> IssuerResolution {
        IssuerResolution::GlobalFallback
    }

    fn candidates(&self, ctx: &InferenceContext<'_>) -> Vec<Candidate> {
        let mut ordered: Vec<&OcrLine> = ctx.lines().iter().collect();
        ordered.sort_by_key(|l| l.top());

        ordered
            .into_iter()
            .take(ctx.settings.top_lines)
            .filter_map(|l| ctx.score(&l.text()))
            .filter(|c| c.text.chars().count() >= ctx.settings.min_fallback_len)
            .collect()
    }
}

/// Ordered fallback chain of strategies.
pub struct IssuerEngine {
    strategies: Vec<Box<dyn IssuerStrategy>>,
}

impl IssuerEngine {
    /// Chain: CNPJ anchor, marker anchor, label block, top of page.
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(CnpjAnchor),
                Box::new(MarkerAnchor),
                Box::new(LabelBlock),
                Box::new(TopOfPage),
            ],
        }
    }

    /// Engine with a custom strategy order.
    pub fn with_strategies(strategies: Vec<Box<dyn IssuerStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn infer(&self, ctx: &InferenceContext<'_>) -> IssuerInference {
        let mut fallback: Option<(String, Candidate, IssuerResolution)> = None;

        for strategy in &self.strategies {
            let candidates = strategy.candidates(ctx);
            let Some(best) = best_candidate(candidates) else {
                trace!("Strategy {} produced no candidate", strategy.name());
                continue;
            };

            let slug = slugify(&best.text);
            if slug == EMPTY_SLUG {
                continue;
            }

            if best.score <= 0 {
                trace!("Strategy {} best candidate {:?} scored {}", strategy.name(), best.text, best.score);
                if fallback.as_ref().map_or(true, |(_, kept, _)| best.score > kept.score) {
                    fallback = Some((slug, best, strategy.resolution()));
                }
                continue;
            }

            debug!("Issuer {} via {} (score {})", slug, strategy.name(), best.score);
            return IssuerInference {
                issuer: slug,
                resolution: strategy.resolution(),
                candidate: Some(best),
            };
        }

        match fallback {
            Some((issuer, candidate, resolution)) => {
                debug!("Issuer {} from best non-positive candidate (score {})", issuer, candidate.score);
                IssuerInference {
                    issuer,
                    resolution,
                    candidate: Some(candidate),
                }
            }
            None => IssuerInference::unresolved(),
        }
    }
}

impl Default for IssuerEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Highest score wins; ties keep the earliest candidate.
fn best_candidate(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if b.score >= c.score => Some(b),
        _ => Some(c),
    })
}

/// Fixed issuer first, then the canonical CNPJ map.
pub fn resolve_override(config: &IssuerConfig, cnpj: Option<&str>) -> Option<IssuerInference> {
    if let Some(name) = config.fixed_name() {
        let inference = IssuerInference::named(name, IssuerResolution::FixedOverride);
        if inference.resolution == IssuerResolution::FixedOverride {
            return Some(inference);
        }
    }

    let name = config.canonical_name(cnpj?)?;
    let inference = IssuerInference::named(name, IssuerResolution::CanonHit);
    (inference.resolution == IssuerResolution::CanonHit).then_some(inference)
}

/// Infer the issuer of a page: overrides first, then the default chain.
pub fn infer_issuer(layout: &PageLayout, cnpj: Option<&str>, config: &DocsortConfig) -> IssuerInference {
    if let Some(inference) = resolve_override(&config.issuer, cnpj) {
        return inference;
    }

    let ctx = InferenceContext {
        layout,
        cnpj,
        vocabulary: &config.vocabulary,
        settings: &config.issuer.inference,
    };
    IssuerEngine::new().infer(&ctx)
}

/// Clean and score a raw line. `None` when the line can never be a name.
pub fn score_candidate(raw: &str, vocab: &Vocabulary, settings: &InferenceConfig) -> Option<Candidate> {
    let text = clean_candidate(raw, vocab);
    if text.chars().filter(|c| c.is_ascii_alphabetic()).count() < 3 {
        return None;
    }
    if digit_ratio(&text) > settings.digit_ratio_limit {
        return None;
    }

    let upper = text.to_ascii_uppercase();
    let mut score = text.chars().count() as i32;
    score += vocab.suffix_hits(&upper) as i32 * settings.suffix_bonus;
    if vocab.has_negative_token(&upper) {
        score -= settings.rejection_penalty;
    }

    Some(Candidate { text, score })
}

/// Remove a leading label such as "RAZAO SOCIAL:". `None` when no label leads.
fn strip_label_prefix(text: &str, vocab: &Vocabulary) -> Option<String> {
    let upper = text.to_ascii_uppercase();

    for prefix in &vocab.label_prefixes {
        if !upper.starts_with(prefix.as_str()) {
            continue;
        }
        let rest = &text[prefix.len()..];
        if rest.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            continue;
        }
        let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '.'));
        return Some(rest.to_string());
    }

    None
}

fn norm(word: &str) -> String {
    word.trim_matches(|c: char| matches!(c, ',' | ':' | ';'))
        .to_ascii_uppercase()
}

fn is_separator(word: &str) -> bool {
    matches!(word, "-" | "/" | "|")
}

/// Fold accents, strip labels, cut address and municipality tails.
pub fn clean_candidate(raw: &str, vocab: &Vocabulary) -> String {
    let folded = collapse_whitespace(&fold_accents(raw));
    let trimmed = EDGE_PUNCTUATION.replace_all(&folded, "").into_owned();
    let unlabeled = strip_label_prefix(&trimmed, vocab).unwrap_or(trimmed);

    let mut words: Vec<&str> = unlabeled.split_whitespace().collect();
    match words.first() {
        None => return String::new(),
        Some(first) if vocab.is_trailing_token(&norm(first)) => return String::new(),
        Some(_) => {}
    }

    if let Some(cut) = words.iter().skip(1).position(|w| vocab.is_trailing_token(&norm(w))) {
        words.truncate(cut + 1);
    }

    let mut stripped_state = false;
    if words.len() > 1 {
        let last = norm(words[words.len() - 1]);
        if vocab.is_state_code(&last) {
            words.pop();
            stripped_state = true;
        } else if let Some((city, state)) = last.rsplit_once(['/', '-']) {
            if !city.is_empty() && vocab.is_state_code(state) {
                words.pop();
                stripped_state = true;
            }
        }
    }

    if stripped_state {
        while words.last().is_some_and(|w| is_separator(w)) {
            words.pop();
        }
        if let Some(sep) = words.iter().rposition(|w| is_separator(w)) {
            words.truncate(sep);
        } else if words.len() > 1 && words.last().is_some_and(|w| w.ends_with(',')) {
            words.pop();
        }
    }

    let joined = words.join(" ");
    EDGE_PUNCTUATION.replace_all(&joined, "").into_owned()
}
