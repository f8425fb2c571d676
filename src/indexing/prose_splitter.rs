/// Character-budget splitter for documentation and data files.
#[derive(Debug, Clone)]
pub struct ProseSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    /// Joins this piece to the one before it.
    sep: &'static str,
    chars: usize,
}

impl Piece {
    fn new(text: &str, sep: &'static str) -> Self {
        Self {
            text: text.to_string(),
            sep,
            chars: text.chars().count(),
        }
    }
}

impl ProseSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, content: &str) -> Vec<String> {
        let pieces = self.pieces(content);
        let mut chunks = Vec::new();
        let mut current: Vec<Piece> = Vec::new();

        for piece in pieces {
            if !current.is_empty()
                && joined_len(&current) + piece.sep.len() + piece.chars > self.chunk_size
            {
                chunks.push(join(&current));
                current = self.overlap_tail(&current);
                while !current.is_empty()
                    && joined_len(&current) + piece.sep.len() + piece.chars > self.chunk_size
                {
                    current.remove(0);
                }
            }
            current.push(piece);
        }

        if !current.is_empty() {
            chunks.push(join(&current));
        }
        chunks
    }

    /// Paragraphs, falling back to sentences, words and raw characters for oversized spans.
    fn pieces(&self, content: &str) -> Vec<Piece> {
        let mut pieces = Vec::new();
        for paragraph in content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if paragraph.chars().count() <= self.chunk_size {
                pieces.push(Piece::new(paragraph, "\n\n"));
                continue;
            }

            let mut sep = "\n\n";
            for (sentence, next_sep) in split_sentences(paragraph) {
                if sentence.chars().count() <= self.chunk_size {
                    pieces.push(Piece::new(sentence, sep));
                } else {
                    self.push_words(sentence, sep, &mut pieces);
                }
                sep = next_sep;
            }
        }
        pieces
    }

    fn push_words(&self, sentence: &str, first_sep: &'static str, pieces: &mut Vec<Piece>) {
        let mut sep = first_sep;
        for word in sentence.split_whitespace() {
            if word.chars().count() <= self.chunk_size {
                pieces.push(Piece::new(word, sep));
            } else {
                let chars: Vec<char> = word.chars().collect();
                for (idx, part) in chars.chunks(self.chunk_size).enumerate() {
                    let text: String = part.iter().collect();
                    pieces.push(Piece::new(&text, if idx == 0 { sep } else { "" }));
                }
            }
            sep = " ";
        }
    }

    fn overlap_tail(&self, current: &[Piece]) -> Vec<Piece> {
        let mut tail = Vec::new();
        let mut total = 0usize;
        for piece in current.iter().rev() {
            let cost = piece.chars + if tail.is_empty() { 0 } else { piece.sep.len() };
            if total + cost > self.chunk_overlap {
                break;
            }
            total += cost;
            tail.push(piece.clone());
        }
        tail.reverse();
        tail
    }
}

/// Splits after `.`, `!` or `?` followed by whitespace, and at newlines. Each sentence is
/// returned with the separator that should precede the next one.
fn split_sentences(text: &str) -> Vec<(&str, &'static str)> {
    let mut sentences = Vec::new();
    let mut start = 0usize;

    for (idx, c) in text.char_indices() {
        let end = idx + c.len_utf8();
        let next_sep = match c {
            '\n' => "\n",
            '.' | '!' | '?' if text[end..].starts_with('\n') => "\n",
            '.' | '!' | '?' if text[end..].starts_with(char::is_whitespace) => " ",
            _ => continue,
        };
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push((sentence, next_sep));
        }
        start = end;
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push((rest, " "));
    }
    sentences
}

fn joined_len(pieces: &[Piece]) -> usize {
    pieces
        .iter()
        .enumerate()
        .map(|(idx, piece)| piece.chars + if idx == 0 { 0 } else { piece.sep.len() })
        .sum()
}

fn join(pieces: &[Piece]) -> String {
    let mut out = String::new();
    for (idx, piece) in pieces.iter().enumerate() {
        if idx > 0 {
            out.push_str(piece.sep);
        }
        out.push_str(&piece.text);
    }
    out
}
