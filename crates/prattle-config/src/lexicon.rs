use serde::{Deserialize, Serialize};

/// Every word list and pattern table used by the response cascade.
///
/// Stages never hard-code vocabulary; they are compiled from this section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    /// Words removed by the tokenizer.
    pub stopwords: Vec<String>,
    /// Self-harm and similar sensitive content. Checked first.
    pub sensitive: GuardConfig,
    /// Insults and abuse.
    pub insults: GuardConfig,
    /// Questions the responder refuses to answer.
    pub forbidden_questions: GuardConfig,
    /// Canned answers; table order is priority order.
    pub faq: Vec<FaqEntry>,
    /// Keyword-triggered canned replies (greetings, thanks, jokes, ...).
    pub topics: Vec<TopicEntry>,
    /// Patterns like "I went to X" answered with a contextual prompt.
    pub follow_ups: Vec<FollowUpRule>,
    /// Patterns that turn raw text into knowledge triples.
    pub knowledge_patterns: Vec<KnowledgePattern>,
    /// Word sets consumed by the sentiment scorer.
    pub sentiment: SentimentLexicon,
    /// Replies for the sentiment-conditioned stage.
    pub sentiment_responses: SentimentResponses,
}

/// A guard: any matching term yields the fixed response.
///
/// Single words match whole normalized words; phrases containing a space
/// match as substrings of the normalized text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    /// Substrings searched for in the lowercased input.
    pub triggers: Vec<String>,
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicEntry {
    pub name: String,
    /// Tokens that select this topic.
    pub keywords: Vec<String>,
    /// Candidate replies; one is picked at random.
    pub responses: Vec<String>,
    /// Avoid repeating a reply until every reply has been used.
    #[serde(default)]
    pub no_repeat: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUpRule {
    /// Regular expression applied to the raw input.
    pub pattern: String,
    /// Reply template; `{1}`, `{2}`, ... are replaced by capture groups.
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgePattern {
    /// Regular expression applied to the raw input.
    pub pattern: String,
    /// Capture group holding the subject.
    pub subject: usize,
    /// Literal predicate, or `$N` to take capture group N.
    pub predicate: String,
    /// Capture group holding the object.
    pub object: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentLexicon {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub question: Vec<String>,
    pub excited: Vec<String>,
    /// Flip the polarity of the next sentiment word.
    pub negations: Vec<String>,
    /// Double the weight of the next sentiment word.
    pub intensifiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentResponses {
    pub negative: Vec<String>,
    pub positive: Vec<String>,
    pub excited: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            stopwords: strings(prattle_core::text::DEFAULT_STOPWORDS),
            sensitive: GuardConfig {
                terms: strings(&["suicide", "kill myself", "self harm", "hurt myself", "خودکشی"]),
                response: "That sounds really heavy. Please talk to someone you trust or a local helpline, you don't have to carry it alone. 💙".into(),
            },
            insults: GuardConfig {
                terms: strings(&["stupid", "idiot", "dumb", "moron", "shut up", "احمق", "خفه شو"]),
                response: "Hey, that's not nice. Let's keep it friendly 🙂".into(),
            },
            forbidden_questions: GuardConfig {
                terms: strings(&[
                    "are you a bot",
                    "are you a robot",
                    "are you an ai",
                    "your password",
                    "your token",
                    "ربات هستی",
                ]),
                response: "That's a secret 🤫".into(),
            },
            faq: vec![
                FaqEntry {
                    triggers: strings(&["creator", "who made you", "who built you", "سازنده", "ساخته"]),
                    response: "I was built by the Prattle contributors. You can find them on GitHub.".into(),
                },
                FaqEntry {
                    triggers: strings(&["your name", "اسمت"]),
                    response: "People call me Prattle 😊".into(),
                },
            ],
            topics: vec![
                TopicEntry {
                    name: "greeting".into(),
                    keywords: strings(&["hello", "hi", "hey", "سلام"]),
                    responses: strings(&["Hi friend! How can I help? 😊", "Hello! At your service 😊"]),
                    no_repeat: false,
                },
                TopicEntry {
                    name: "farewell".into(),
                    keywords: strings(&["bye", "goodbye", "خداحافظ"]),
                    responses: strings(&["Bye! Have a great day.", "Good luck 👋"]),
                    no_repeat: false,
                },
                TopicEntry {
                    name: "thanks".into(),
                    keywords: strings(&["thanks", "thank", "مرسی"]),
                    responses: strings(&["You're welcome!", "Anytime 😉"]),
                    no_repeat: false,
                },
                TopicEntry {
                    name: "joke".into(),
                    keywords: strings(&["joke", "jokes", "جوک"]),
                    responses: strings(&[
                        "Why did the scarecrow win an award? He was outstanding in his field!",
                        "What do you call a fake noodle? An impasta!",
                        "Why don't eggs tell jokes? They'd crack each other up!",
                    ]),
                    no_repeat: true,
                },
            ],
            follow_ups: vec![
                FollowUpRule {
                    pattern: r"(?i)\bi went to (?:the )?([\p{L}\p{N} ]{2,40})".into(),
                    response: "Oh, you went to {1}? How was it?".into(),
                },
                FollowUpRule {
                    pattern: r"(?i)\bi (?:just )?(?:bought|got) (?:a |an |the )?([\p{L}\p{N} ]{2,40})".into(),
                    response: "Nice! Do you like the {1}?".into(),
                },
                FollowUpRule {
                    pattern: r"(?i)\bi(?: am|'m) going to ([\p{L}\p{N} ]{2,40})".into(),
                    response: "Sounds fun! When are you going to {1}?".into(),
                },
            ],
            knowledge_patterns: vec![
                KnowledgePattern {
                    pattern: r"(?i)\b(\p{L}[\p{L}\p{N}_]*) (is|are|was|were) (?:a |an |the )?(\p{L}[\p{L}\p{N}_]*)".into(),
                    subject: 1,
                    predicate: "$2".into(),
                    object: 3,
                },
                KnowledgePattern {
                    pattern: r"(?i)\b(\p{L}[\p{L}\p{N}_]*) (likes|loves|hates|owns|has) (?:a |an |the )?(\p{L}[\p{L}\p{N}_]*)".into(),
                    subject: 1,
                    predicate: "$2".into(),
                    object: 3,
                },
                KnowledgePattern {
                    pattern: r"(?i)\b(\p{L}[\p{L}\p{N}_]*) belongs to (\p{L}[\p{L}\p{N}_]*)".into(),
                    subject: 1,
                    predicate: "belongs to".into(),
                    object: 2,
                },
                KnowledgePattern {
                    pattern: r"([آ-ی]+) (?:را|رو) ([آ-ی]+)".into(),
                    subject: 1,
                    predicate: "درباره".into(),
                    object: 2,
                },
            ],
            sentiment: SentimentLexicon::default(),
            sentiment_responses: SentimentResponses::default(),
        }
    }
}

impl Default for SentimentLexicon {
    fn default() -> Self {
        Self {
            positive: strings(&[
                "good", "great", "awesome", "love", "happy", "nice", "excellent", "glad", "خوب",
                "عالی", "ممنون", "دوست دارم",
            ]),
            negative: strings(&[
                "bad", "sad", "terrible", "hate", "awful", "angry", "upset", "problem", "بد", "زشت",
                "مشکل", "ناراحت",
            ]),
            question: strings(&[
                "why", "how", "what", "who", "when", "where", "which", "چرا", "چطور", "کیست", "چیست",
                "کجا",
            ]),
            excited: strings(&["wow", "yay", "amazing", "omg", "woohoo", "هورا"]),
            negations: strings(&["not", "never", "no", "dont", "isnt", "نه", "نیست"]),
            intensifiers: strings(&["very", "really", "so", "extremely", "خیلی"]),
        }
    }
}

impl Default for SentimentResponses {
    fn default() -> Self {
        Self {
            negative: strings(&["I'm sorry you feel that way 😢", "Oh no, I hope it gets better soon 😢"]),
            positive: strings(&["That's great to hear! 😊", "Yay, I'm happy for you 😊"]),
            excited: strings(&["Woohoo! 🎉 That's so exciting!", "Wow, amazing! 🤩"]),
        }
    }
}
