use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    sync::{Arc, OnceLock},
};

use lindera::{
    dictionary::{DictionaryKind, load_dictionary_from_kind},
    mode::Mode,
    segmenter::Segmenter as LinderaSegmenter,
    tokenizer::Tokenizer as LinderaTokenizer,
};
use tantivy::tokenizer::{
    TextAnalyzer,
    Token,
    TokenStream,
    Tokenizer,
    TokenizerManager,
};

use crate::error::{Error, Result};

/// Name of the segmenter used when none is configured: morphological
/// analysis with the IPADIC dictionary.
pub const DEFAULT_SEGMENTER: &str = "ipadic";

/// Punctuation stripped from tokens in addition to ASCII punctuation.
const WIDE_PUNCTUATION: &[char] = &[
    '、', '。', '，', '．', '・', '「', '」', '『', '』', '（', '）', '！', '？',
    '：', '；', '〜', '～', '…', '‥', '【', '】', '〈', '〉', '《', '》', '〔',
    '〕', '［', '］', '｛', '｝', '＂', '＇', '“', '”', '‘', '’', '—', '―',
    '♪', '♫',
];

/// One surface unit produced by a segmenter, with byte offsets into the
/// segmented text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub offset_from: usize,
    pub offset_to: usize,
}

/// Splits raw text into word-like units.
///
/// Implementations must be deterministic and free of side effects: the
/// same segmenter builds the index and tokenizes queries against it.
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> Result<Vec<Segment>>;
}

/// Normalize a surface token for indexing and lookup.
///
/// Trims, lowercases and strips punctuation. Text without case or
/// punctuation (kana, kanji) passes through unchanged. Returns an empty
/// string for tokens that are pure punctuation.
pub fn normalize_token(token: &str) -> String {
    token
        .trim()
        .chars()
        .filter(|c| {
            !c.is_ascii_punctuation() && !WIDE_PUNCTUATION.contains(c)
        })
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim()
        .to_string()
}

// -- Morphological segmenter --

/// Japanese morphological analysis backed by lindera and the embedded
/// IPADIC dictionary. `私は元気です` becomes `私`, `は`, `元気`, `です`.
///
/// Cloning is cheap; clones share one loaded dictionary.
#[derive(Clone)]
pub struct MorphologicalSegmenter {
    tokenizer: Arc<LinderaTokenizer>,
}

impl MorphologicalSegmenter {
    /// The process-wide instance. The dictionary is loaded on first use.
    pub fn shared() -> Result<Self> {
        static SHARED: OnceLock<MorphologicalSegmenter> = OnceLock::new();

        if let Some(segmenter) = SHARED.get() {
            return Ok(segmenter.clone());
        }
        let loaded = Self::load()?;
        Ok(SHARED.get_or_init(|| loaded).clone())
    }

    fn load() -> Result<Self> {
        let dictionary = load_dictionary_from_kind(DictionaryKind::IPADIC)
            .map_err(|e| {
                Error::Tokenization(format!("cannot load IPADIC: {e}"))
            })?;
        let segmenter = LinderaSegmenter::new(Mode::Normal, dictionary, None);
        Ok(Self {
            tokenizer: Arc::new(LinderaTokenizer::new(segmenter)),
        })
    }
}

impl Segmenter for MorphologicalSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<Segment>> {
        let tokens = self
            .tokenizer
            .tokenize(text)
            .map_err(|e| Error::Tokenization(e.to_string()))?;
        Ok(tokens
            .into_iter()
            .map(|token| Segment {
                text: token.text.to_string(),
                offset_from: token.byte_start,
                offset_to: token.byte_end,
            })
            .collect())
    }
}

impl fmt::Debug for MorphologicalSegmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MorphologicalSegmenter")
            .field("dictionary", &DEFAULT_SEGMENTER)
            .finish_non_exhaustive()
    }
}

/// Token stream over segments computed up front.
pub struct SegmentStream {
    tokens: Vec<Token>,
    index: usize,
}

impl Tokenizer for MorphologicalSegmenter {
    type TokenStream<'a> = SegmentStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> SegmentStream {
        // Token streams cannot fail. Errors surface through `Segmenter`,
        // which is what index builds and queries use.
        let segments = self.segment(text).unwrap_or_else(|e| {
            tracing::error!("segmentation failed: {e}");
            Vec::new()
        });
        let tokens = segments
            .into_iter()
            .enumerate()
            .map(|(position, segment)| Token {
                offset_from: segment.offset_from,
                offset_to: segment.offset_to,
                position,
                text: segment.text,
                position_length: 1,
            })
            .collect();
        SegmentStream { tokens, index: 0 }
    }
}

impl TokenStream for SegmentStream {
    fn advance(&mut self) -> bool {
        if self.index < self.tokens.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.index - 1]
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.tokens[self.index - 1]
    }
}

/// All analyzers a tokenizer can be configured with, keyed by name.
///
/// Besides [`DEFAULT_SEGMENTER`] this carries tantivy's stock analyzers
/// (`default`, `whitespace`, `raw`, `en_stem`).
pub fn segmenter_registry() -> Result<TokenizerManager> {
    let manager = TokenizerManager::default();
    manager.register(
        DEFAULT_SEGMENTER,
        TextAnalyzer::from(MorphologicalSegmenter::shared()?),
    );
    Ok(manager)
}

/// A [`Segmenter`] backed by a tantivy text analyzer.
#[derive(Clone)]
pub struct AnalyzerSegmenter {
    analyzer: TextAnalyzer,
}

impl AnalyzerSegmenter {
    pub fn new(analyzer: TextAnalyzer) -> Self {
        Self { analyzer }
    }
}

impl Segmenter for AnalyzerSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<Segment>> {
        // Token streams borrow the analyzer mutably; a clone per call keeps
        // the segmenter shareable across threads.
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        let mut segments = Vec::new();
        while stream.advance() {
            let token = stream.token();
            segments.push(Segment {
                text: token.text.clone(),
                offset_from: token.offset_from,
                offset_to: token.offset_to,
            });
        }
        Ok(segments)
    }
}

// -- Tokenizer service --

/// The one tokenization routine shared by index builds and queries:
/// segment, then [`normalize_token`], then drop empty tokens.
#[derive(Clone)]
pub struct TextTokenizer {
    name: String,
    segmenter: Arc<dyn Segmenter>,
}

impl TextTokenizer {
    pub fn new(
        name: impl Into<String>,
        segmenter: impl Segmenter + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            segmenter: Arc::new(segmenter),
        }
    }

    /// The default tokenizer, [`DEFAULT_SEGMENTER`].
    pub fn morphological() -> Result<Self> {
        Ok(Self::new(DEFAULT_SEGMENTER, MorphologicalSegmenter::shared()?))
    }

    /// Look up a segmenter by name.
    ///
    /// The morphological segmenter is used directly so its errors reach the
    /// caller; other names resolve through [`segmenter_registry`].
    pub fn by_name(name: &str) -> Result<Self> {
        if name == DEFAULT_SEGMENTER {
            return Self::morphological();
        }
        let analyzer = segmenter_registry()?.get(name).ok_or_else(|| {
            Error::Tokenization(format!("unknown segmenter '{name}'"))
        })?;
        Ok(Self::new(name, AnalyzerSegmenter::new(analyzer)))
    }

    /// Name the segmenter is registered under. Stored with each index
    /// generation so queries use the segmenter the index was built with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized tokens of `text`, in order, duplicates kept.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        Ok(self
            .segmenter
            .segment(text)?
            .into_iter()
            .map(|segment| normalize_token(&segment.text))
            .filter(|token| !token.is_empty())
            .collect())
    }

    /// Distinct normalized tokens of `text`, in first-occurrence order.
    pub fn unique_tokens(&self, text: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        Ok(self
            .tokenize(text)?
            .into_iter()
            .filter(|token| seen.insert(token.clone()))
            .collect())
    }

    /// Wrap every segment of `text` whose normalized form is in `tokens`
    /// between `open` and `close`.
    pub fn highlight(
        &self,
        text: &str,
        tokens: &BTreeSet<String>,
        open: &str,
        close: &str,
    ) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;

        for segment in self.segmenter.segment(text)? {
            let (from, to) = (segment.offset_from, segment.offset_to);
            if from < cursor
                || to > text.len()
                || !text.is_char_boundary(from)
                || !text.is_char_boundary(to)
            {
                continue;
            }
            if tokens.contains(&normalize_token(&segment.text)) {
                out.push_str(&text[cursor..from]);
                out.push_str(open);
                out.push_str(&text[from..to]);
                out.push_str(close);
                cursor = to;
            }
        }
        out.push_str(&text[cursor..]);

        Ok(out)
    }
}

impl fmt::Debug for TextTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextTokenizer")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        TextTokenizer::morphological().unwrap().tokenize(text).unwrap()
    }

    #[test]
    fn segments_japanese_into_words() {
        assert_eq!(tokens("私は元気です"), vec!["私", "は", "元気", "です"]);
        assert_eq!(tokens("これはペンです"), vec!["これ", "は", "ペン", "です"]);
    }

    #[test]
    fn particles_split_from_kana_words() {
        let words = tokens("ラーメンを食べた");
        assert_eq!(words[0], "ラーメン");
        assert_eq!(words[1], "を");
        assert!(tokens("ありがとうございます").len() > 1);
    }

    #[test]
    fn long_kana_runs_still_produce_tokens() {
        let words = tokens("そうだったのかもしれないけれど");
        assert!(words.len() > 3, "{words:?}");
        assert!(words.contains(&"そう".to_string()), "{words:?}");
    }

    #[test]
    fn punctuation_is_dropped() {
        let words = tokens("「行くぞ！」…うん。");
        assert!(words.contains(&"うん".to_string()), "{words:?}");
        assert!(words.iter().all(|w| !w.contains(['「', '！', '…', '。'])));
    }

    #[test]
    fn latin_text_is_lowercased() {
        assert_eq!(tokens("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn empty_and_punctuation_only_text_has_no_tokens() {
        assert!(tokens("").is_empty());
        assert!(tokens("  ...!?  ").is_empty());
        assert!(tokens("……。、").is_empty());
    }

    #[test]
    fn normalize_is_noop_for_kana_and_kanji() {
        assert_eq!(normalize_token("元気"), "元気");
        assert_eq!(normalize_token("です"), "です");
    }

    #[test]
    fn normalize_strips_case_and_punctuation() {
        assert_eq!(normalize_token("  Hello!  "), "hello");
        assert_eq!(normalize_token("「元気」"), "元気");
        assert_eq!(normalize_token("..."), "");
    }

    #[test]
    fn offsets_point_into_the_source_text() {
        let text = "Oh、元気?";
        let segments =
            MorphologicalSegmenter::shared().unwrap().segment(text).unwrap();
        assert!(!segments.is_empty());
        for segment in &segments {
            assert_eq!(
                &text[segment.offset_from..segment.offset_to],
                segment.text
            );
        }
        assert!(segments.iter().any(|s| s.text == "元気"));
    }

    #[test]
    fn registry_analyzer_matches_direct_segmentation() {
        let analyzer =
            segmenter_registry().unwrap().get(DEFAULT_SEGMENTER).unwrap();
        let text = "私は元気です";
        assert_eq!(
            AnalyzerSegmenter::new(analyzer).segment(text).unwrap(),
            MorphologicalSegmenter::shared().unwrap().segment(text).unwrap()
        );
    }

    #[test]
    fn unique_tokens_keep_first_occurrence_order() {
        let tokenizer = TextTokenizer::morphological().unwrap();
        assert_eq!(
            tokenizer.unique_tokens("go GO stop go").unwrap(),
            vec!["go", "stop"]
        );
    }

    #[test]
    fn by_name_resolves_registered_analyzers() {
        let tokenizer = TextTokenizer::by_name("whitespace").unwrap();
        assert_eq!(tokenizer.name(), "whitespace");
        assert_eq!(
            tokenizer.tokenize("私は 元気です").unwrap(),
            vec!["私は", "元気です"]
        );
        assert_eq!(
            TextTokenizer::by_name(DEFAULT_SEGMENTER).unwrap().name(),
            DEFAULT_SEGMENTER
        );

        let err = TextTokenizer::by_name("mecab").unwrap_err();
        assert!(matches!(err, Error::Tokenization(_)));
    }

    #[test]
    fn highlight_marks_matching_segments() {
        let tokenizer = TextTokenizer::morphological().unwrap();
        let wanted: BTreeSet<String> =
            ["元気".to_string(), "hello".to_string()].into_iter().collect();
        assert_eq!(
            tokenizer
                .highlight("Hello! 私は元気です", &wanted, "[", "]")
                .unwrap(),
            "[Hello]! 私は[元気]です"
        );
    }

    struct FailingSegmenter;

    impl Segmenter for FailingSegmenter {
        fn segment(&self, _text: &str) -> Result<Vec<Segment>> {
            Err(Error::Tokenization("dictionary missing".into()))
        }
    }

    #[test]
    fn segmenter_failures_propagate() {
        let tokenizer = TextTokenizer::new("broken", FailingSegmenter);
        assert!(matches!(
            tokenizer.tokenize("anything"),
            Err(Error::Tokenization(_))
        ));
    }
}
