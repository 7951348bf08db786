/// Splits a chat message into chunks of at most `max_len` characters.
///
/// Whole lines are packed together while they fit. A line longer than the
/// limit is broken at the last whitespace before the limit, or hard-split when
/// it has none. Empty input yields no chunks.
pub fn split_message(message: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in message.lines() {
        let line_len = line.chars().count();
        if line_len > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.extend(split_long_line(line, max_len));
            continue;
        }

        let needed = if current.is_empty() {
            line_len
        } else {
            current_len + 1 + line_len
        };
        if needed > max_len {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long_line(line: &str, max_len: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest: Vec<char> = line.chars().collect();

    while rest.len() > max_len {
        let window = &rest[..=max_len.min(rest.len() - 1)];
        let cut = window
            .iter()
            .rposition(|c| c.is_whitespace())
            .filter(|&idx| idx > 0);
        let (head, tail_start) = match cut {
            Some(idx) => (rest[..idx].iter().collect::<String>(), idx + 1),
            None => (rest[..max_len].iter().collect::<String>(), max_len),
        };
        pieces.push(head.trim_end().to_string());
        rest = rest[tail_start..].to_vec();
        while rest.first().is_some_and(|c| c.is_whitespace()) {
            rest.remove(0);
        }
    }
    if !rest.is_empty() {
        pieces.push(rest.into_iter().collect());
    }
    pieces
}
