//! Sequence partitioning for inputs longer than the model context.

use crate::error::{EmbeddingError, Result};
use crate::tokenizer::Token;

/// Split a token sequence into partitions of at most `max_len` tokens.
///
/// `tokens` must start and end with a boundary marker; the markers are left
/// out of every partition. A partition never ends right before a
/// continuation token, so no word is split across two partitions.
pub fn partition(tokens: &[Token], max_len: usize) -> Result<Vec<&[Token]>> {
    if max_len == 0 {
        return Err(EmbeddingError::InvalidConfig(
            "max_sequence_length must be greater than zero".to_string(),
        ));
    }

    let mut partitions = Vec::new();
    if tokens.len() < 2 {
        return Ok(partitions);
    }

    let end = tokens.len() - 1;
    let mut from = 1;
    while from < end {
        let mut to = from + max_len;
        if to >= end {
            to = end;
        } else {
            while tokens[to].is_continuation() {
                to -= 1;
                if to == from {
                    return Err(EmbeddingError::Partition(format!(
                        "word starting at token {from} is longer than {max_len} tokens"
                    )));
                }
            }
        }
        partitions.push(&tokens[from..to]);
        from = to;
    }

    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_SEQUENCE_LENGTH;
    use pretty_assertions::assert_eq;

    fn wrap(body: Vec<Token>) -> Vec<Token> {
        let mut tokens = vec![Token::new("[CLS]")];
        tokens.extend(body);
        tokens.push(Token::new("[SEP]"));
        tokens
    }

    fn words(n: usize) -> Vec<Token> {
        (0..n).map(|i| Token::new(format!("w{i}"))).collect()
    }

    #[test]
    fn test_short_sequence_is_one_partition() {
        let tokens = wrap(words(4));
        let parts = partition(&tokens, MAX_SEQUENCE_LENGTH).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], &tokens[1..5]);
    }

    #[test]
    fn test_markers_only_yields_no_partitions() {
        let tokens = wrap(Vec::new());
        assert!(partition(&tokens, MAX_SEQUENCE_LENGTH).unwrap().is_empty());
        assert!(partition(&[], MAX_SEQUENCE_LENGTH).unwrap().is_empty());
    }

    #[test]
    fn test_max_plus_five_splits_in_two() {
        let tokens = wrap(words(MAX_SEQUENCE_LENGTH + 5));
        let parts = partition(&tokens, MAX_SEQUENCE_LENGTH).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), MAX_SEQUENCE_LENGTH);
        assert_eq!(parts[1].len(), 5);
    }

    #[test]
    fn test_boundary_retreats_out_of_a_word() {
        let mut body = words(MAX_SEQUENCE_LENGTH + 5);
        // Tokens at body positions 508..=511 form one word: "w508 ##a ##b ##c".
        for (offset, piece) in ["##a", "##b", "##c"].iter().enumerate() {
            body[MAX_SEQUENCE_LENGTH - 1 + offset] = Token::new(*piece);
        }
        let tokens = wrap(body);
        let parts = partition(&tokens, MAX_SEQUENCE_LENGTH).unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), MAX_SEQUENCE_LENGTH - 2);
        assert_eq!(parts[0].len() + parts[1].len(), MAX_SEQUENCE_LENGTH + 5);
        for part in &parts {
            assert!(!part[0].is_continuation());
        }
        assert_eq!(parts[1][0].text, format!("w{}", MAX_SEQUENCE_LENGTH - 2));
    }

    #[test]
    fn test_word_longer_than_partition_fails() {
        let tokens = wrap(vec![
            Token::new("super"),
            Token::new("##cal"),
            Token::new("##ifr"),
            Token::new("##agil"),
            Token::new("end"),
        ]);
        assert!(matches!(
            partition(&tokens, 2),
            Err(EmbeddingError::Partition(_))
        ));
    }

    #[test]
    fn test_zero_length_is_rejected() {
        let tokens = wrap(words(3));
        assert!(partition(&tokens, 0).is_err());
    }
}
