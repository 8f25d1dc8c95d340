//! Splits subtitle text into token-bounded chunks of whole records.
//!
//! Records are separated by blank lines. A block only counts as a record when
//! it has at least three lines and more than ten characters once trimmed;
//! anything else (headers, stray fragments) is dropped without complaint.
//! Chunks never cut through a record, so a single oversized record becomes a
//! chunk of its own.

use tracing::debug;

use crate::tokenizer::Tokenizer;

/// Separator between records, both in the input and inside a chunk
pub const BLOCK_SEPARATOR: &str = "\n\n";

const MIN_BLOCK_LINES: usize = 3;
const MIN_BLOCK_CHARS: usize = 10;

/// Best-effort view over one subtitle block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub sequence: Option<u64>,
    pub time_range: String,
    pub text: String,
}

impl Record {
    /// Read a block as sequence number, time range and text lines.
    /// Returns `None` for blocks that are not well-formed.
    pub fn parse(block: &str) -> Option<Self> {
        if !is_well_formed(block) {
            return None;
        }

        let mut lines = block.trim().lines();
        let sequence = lines.next().and_then(|line| line.trim().parse().ok());
        let time_range = lines.next().unwrap_or_default().trim().to_string();
        let text = lines.map(str::trim).collect::<Vec<_>>().join("\n");

        Some(Self { sequence, time_range, text })
    }
}

/// A group of whole records sent to the completion service as one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub token_count: usize,
    pub block_count: usize,
    pub first_sequence: Option<u64>,
    pub last_sequence: Option<u64>,
}

impl Chunk {
    fn from_blocks(blocks: &[&str], token_count: usize) -> Self {
        Self {
            text: blocks.join(BLOCK_SEPARATOR),
            token_count,
            block_count: blocks.len(),
            first_sequence: blocks.first().and_then(|b| Record::parse(b)).and_then(|r| r.sequence),
            last_sequence: blocks.last().and_then(|b| Record::parse(b)).and_then(|r| r.sequence),
        }
    }

    /// The records of this chunk, in order
    pub fn blocks(&self) -> impl Iterator<Item = &str> {
        self.text.split(BLOCK_SEPARATOR)
    }
}

/// Whether a block survives the record pre-filter
pub fn is_well_formed(block: &str) -> bool {
    let trimmed = block.trim();
    trimmed.lines().count() >= MIN_BLOCK_LINES && trimmed.chars().count() > MIN_BLOCK_CHARS
}

/// Normalized, filtered record blocks of `text`, in input order
pub fn well_formed_blocks(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .trim()
        .split(BLOCK_SEPARATOR)
        .filter(|block| is_well_formed(block))
        .map(str::to_string)
        .collect()
}

pub struct Chunker {
    tokenizer: Box<dyn Tokenizer>,
}

impl Chunker {
    pub fn new(tokenizer: Box<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    /// Greedily pack well-formed blocks into chunks of at most `max_tokens`
    pub fn split(&self, text: &str, max_tokens: usize) -> Vec<Chunk> {
        let blocks = well_formed_blocks(text);

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0;

        for block in &blocks {
            let tokens = self.tokenizer.count(block);

            if current_tokens + tokens > max_tokens {
                if !current.is_empty() {
                    chunks.push(Chunk::from_blocks(&current, current_tokens));
                }
                current = vec![block.as_str()];
                current_tokens = tokens;
            } else {
                current.push(block.as_str());
                current_tokens += tokens;
            }
        }

        if !current.is_empty() {
            chunks.push(Chunk::from_blocks(&current, current_tokens));
        }

        debug!(
            "Split {} records into {} chunks (max {} tokens)",
            blocks.len(),
            chunks.len(),
            max_tokens
        );

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per whitespace-separated word
    struct WordTokenizer;

    impl Tokenizer for WordTokenizer {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    fn chunker() -> Chunker {
        Chunker::new(Box::new(WordTokenizer))
    }

    // Five words each: sequence, time range, three words of text
    fn block(n: u64) -> String {
        format!("{}\n00:00:0{},000-->00:00:0{},500\nuno due tre", n, n, n)
    }

    fn srt(blocks: &[String]) -> String {
        blocks.join("\n\n")
    }

    #[test]
    fn test_three_blocks_of_five_with_budget_ten() {
        let blocks = vec![block(1), block(2), block(3)];
        let chunks = chunker().split(&srt(&blocks), 10);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, format!("{}\n\n{}", blocks[0], blocks[1]));
        assert_eq!(chunks[0].token_count, 10);
        assert_eq!(chunks[0].block_count, 2);
        assert_eq!(chunks[0].first_sequence, Some(1));
        assert_eq!(chunks[0].last_sequence, Some(2));
        assert_eq!(chunks[1].text, blocks[2]);
        assert_eq!(chunks[1].block_count, 1);
    }

    #[test]
    fn test_no_qualifying_blocks_yields_no_chunks() {
        let text = "WEBVTT\n\n1\nshort\n\nonly two\nlines here at all\n\n";
        assert!(chunker().split(text, 1500).is_empty());
        assert!(chunker().split("", 1500).is_empty());
    }

    #[test]
    fn test_malformed_blocks_are_dropped() {
        let text = format!("HEADER\n\n{}\n\na\nb\nc\n\n{}", block(1), block(2));
        let chunks = chunker().split(&text, 100);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, format!("{}\n\n{}", block(1), block(2)));
    }

    #[test]
    fn test_oversized_block_is_emitted_alone() {
        let big = format!("7\n00:01:00,000 --> 00:01:05,000\n{}", "parola ".repeat(40));
        let text = srt(&[block(1), big.clone(), block(2)]);
        let chunks = chunker().split(&text, 10);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].text, big);
        assert!(chunks[1].token_count > 10);
        assert_eq!(chunks[1].block_count, 1);
    }

    #[test]
    fn test_oversized_first_block_does_not_emit_empty_chunk() {
        let big = format!("1\n00:01:00,000 --> 00:01:05,000\n{}", "parola ".repeat(20).trim());
        let chunks = chunker().split(&srt(&[big, block(2)]), 10);

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
    }

    #[test]
    fn test_chunks_reassemble_to_filtered_blocks() {
        let mut blocks: Vec<String> = (1..=9).map(block).collect();
        blocks.insert(4, "noise".to_string());
        let text = srt(&blocks);

        for max_tokens in [5, 10, 12, 23, 100] {
            let chunks = chunker().split(&text, max_tokens);
            let reassembled: Vec<String> = chunks
                .iter()
                .flat_map(|c| c.blocks().map(str::to_string).collect::<Vec<_>>())
                .collect();

            assert_eq!(reassembled, well_formed_blocks(&text));
            for chunk in &chunks {
                assert!(chunk.token_count <= max_tokens);
                for b in chunk.blocks() {
                    assert!(blocks.iter().any(|orig| orig == b));
                }
            }
        }
    }

    #[test]
    fn test_larger_budget_never_yields_more_chunks() {
        let text = srt(&(1..=20).map(block).collect::<Vec<_>>());
        let mut previous = usize::MAX;

        for max_tokens in [5, 10, 15, 20, 50, 100] {
            let count = chunker().split(&text, max_tokens).len();
            assert!(count <= previous, "{} tokens gave {} chunks", max_tokens, count);
            previous = count;
        }
    }

    #[test]
    fn test_larger_budget_never_yields_more_chunks_with_uneven_blocks() {
        // two tokens of header plus `words` tokens of text
        let sized_block = |n: usize, words: usize| {
            format!("{}\n00:00:01,000-->00:00:02,000\n{}", n, vec!["parola"; words].join(" "))
        };
        let sizes = [1, 8, 3, 13, 2, 5, 21, 1, 4, 9, 2, 2, 17, 6];
        let blocks: Vec<String> = sizes.iter().enumerate().map(|(i, &w)| sized_block(i + 1, w)).collect();
        let text = srt(&blocks);
        let mut previous = usize::MAX;

        for max_tokens in [3, 4, 6, 10, 15, 23, 30, 50, 200] {
            let chunks = chunker().split(&text, max_tokens);
            assert!(chunks.len() <= previous, "{} tokens gave {} chunks", max_tokens, chunks.len());
            previous = chunks.len();

            for chunk in &chunks {
                assert!(chunk.token_count <= max_tokens || chunk.block_count == 1);
            }
            let total: usize = chunks.iter().map(|c| c.block_count).sum();
            assert_eq!(total, sizes.len());
        }
        assert_eq!(previous, 1);
    }

    #[test]
    fn test_crlf_input_is_split() {
        let text = srt(&[block(1), block(2)]).replace('\n', "\r\n");
        let chunks = chunker().split(&text, 5);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, block(1));
    }

    #[test]
    fn test_record_parse() {
        let record = Record::parse("437\n00:27:33,718 --> 00:27:38,490\nin questa lezione\nterciaa").unwrap();
        assert_eq!(record.sequence, Some(437));
        assert_eq!(record.time_range, "00:27:33,718 --> 00:27:38,490");
        assert_eq!(record.text, "in questa lezione\nterciaa");

        let unnumbered = Record::parse("x\n00:00:01,000 --> 00:00:02,000\ntesto").unwrap();
        assert_eq!(unnumbered.sequence, None);

        assert!(Record::parse("1\nshort").is_none());
    }
}
