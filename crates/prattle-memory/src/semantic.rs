use std::collections::HashMap;

/// Term-frequency vector: token → share of the text's tokens.
pub type TermVector = HashMap<String, f64>;

/// Occurrence counts divided by the token count. No idf weighting.
pub fn term_frequency(tokens: &[String]) -> TermVector {
    let mut tf = TermVector::new();
    if tokens.is_empty() {
        return tf;
    }
    let weight = 1.0 / tokens.len() as f64;
    for token in tokens {
        *tf.entry(token.clone()).or_insert(0.0) += weight;
    }
    tf
}

/// Cosine similarity of two term-frequency vectors. Zero when either is empty.
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let norm_a = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.values().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Picks the prior reply most similar to the input, if any is similar enough.
#[derive(Debug, Clone, Copy)]
pub struct SemanticMatcher {
    threshold: f64,
}

impl SemanticMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Best candidate whose similarity strictly exceeds the threshold.
    /// Earlier candidates win ties.
    ///
    /// `candidates` pairs each reply with its tokens.
    pub fn find_best<'a, I>(&self, input_tokens: &[String], candidates: I) -> Option<(&'a str, f64)>
    where
        I: IntoIterator<Item = (&'a str, Vec<String>)>,
    {
        let input = term_frequency(input_tokens);
        if input.is_empty() {
            return None;
        }

        let mut best: Option<(&'a str, f64)> = None;
        for (reply, tokens) in candidates {
            let score = cosine_similarity(&input, &term_frequency(&tokens));
            if score > self.threshold && best.is_none_or(|(_, b)| score > b) {
                best = Some((reply, score));
            }
        }
        best
    }
}
