//! Output file naming

/// Bytes of prompt text kept in a stem, leaving room for the index and the
/// `_<n>.jpeg` suffix within a 255-byte file name
pub const MAX_PROMPT_BYTES: usize = 200;

/// File stem for a generation: zero-padded index, then the prompt with
/// whitespace and path separators replaced by underscores, cut to at most
/// `MAX_PROMPT_BYTES` on a char boundary.
pub fn output_stem(index: u64, prompt: &str) -> String {
    let mut sanitized = String::with_capacity(prompt.len().min(MAX_PROMPT_BYTES));
    for c in prompt.chars() {
        let c = if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c };
        if sanitized.len() + c.len_utf8() > MAX_PROMPT_BYTES {
            break;
        }
        sanitized.push(c);
    }
    format!("{index:05}_{sanitized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_pads_index_and_replaces_spaces() {
        assert_eq!(
            output_stem(7, "realistic image of apple with dim illumination"),
            "00007_realistic_image_of_apple_with_dim_illumination"
        );
    }

    #[test]
    fn test_stem_keeps_wide_indices() {
        assert_eq!(output_stem(123456, "pear"), "123456_pear");
    }

    #[test]
    fn test_stem_never_escapes_directory() {
        assert_eq!(output_stem(1, "../etc/passwd"), "00001_.._etc_passwd");
        assert_eq!(output_stem(2, "a\\b\tc"), "00002_a_b_c");
    }

    #[test]
    fn test_long_prompt_is_cut_to_fit_a_file_name() {
        let prompt = "red apple ".repeat(60);
        let stem = output_stem(3, &prompt);

        assert_eq!(stem.len(), "00003_".len() + MAX_PROMPT_BYTES);
        assert!(stem.starts_with("00003_red_apple_red_apple"));
        assert!(format!("{stem}_3.jpeg").len() <= 255);
    }

    #[test]
    fn test_long_prompt_is_cut_on_a_char_boundary() {
        // 'é' is two bytes, so 200 bytes never splits one in half
        let prompt = "é".repeat(150);
        let stem = output_stem(0, &prompt);
        let kept = stem.trim_start_matches("00000_");

        assert_eq!(kept.len(), MAX_PROMPT_BYTES);
        assert_eq!(kept.chars().count(), MAX_PROMPT_BYTES / 2);

        let odd = format!("x{}", "é".repeat(150));
        let kept = output_stem(0, &odd).trim_start_matches("00000_").to_string();
        assert_eq!(kept.len(), MAX_PROMPT_BYTES - 1);
    }
}
