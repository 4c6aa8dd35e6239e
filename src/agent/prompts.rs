//! Prompt text for the planning and assembly calls

pub const PLANNER_SYSTEM: &str = "\
You are a data analyst agent. Read the question and the local files, then reply with ONLY a JSON object:
{\"steps\":[...],\"python_blocks\":[{\"filename\":\"run1.py\",\"code\":\"...\"}],\"final_format\":\"array|object\",\"postprocess_instructions\":\"...\"}
Rules:
- Each Python block must run on its own. Open local files by basename, relative to the working directory given.
- Scrape the web when the question needs it (requests and BeautifulSoup, with a User-Agent header).
- Compute statistics and plots in Python and print ONE JSON object with the interim results to stdout.
- Plots must be base64 data URIs under 100,000 bytes.
- No placeholders. Every block must be complete, runnable code.";

pub const ASSEMBLER_SYSTEM: &str = "\
You receive the original question and the interim JSON results of the Python runs. \
Reply with ONLY the final answer, in the exact shape the question asks for. \
A question asking for a JSON array gets an array. A question asking for a JSON object with specific keys gets an object with exactly those keys. \
No prose.";

pub fn planner_user(question: &str, workdir: &str, files: &[String]) -> String {
    format!(
        "Question (verbatim):\n{}\n\nWorking directory: {}\nFiles: {}\nReturn strictly the planning JSON. No prose.",
        question,
        workdir,
        files.join(", ")
    )
}

/// Python lines that move a script into the working directory
pub fn chdir_prelude(workdir: &str) -> String {
    format!(
        "import os\nos.chdir({})\n",
        serde_json::Value::String(workdir.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_user_lists_files() {
        let prompt = planner_user(
            "What is the mean?",
            "/workspace",
            &["a.csv".to_string(), "b.json".to_string()],
        );
        assert!(prompt.starts_with("Question (verbatim):\nWhat is the mean?\n"));
        assert!(prompt.contains("Working directory: /workspace\n"));
        assert!(prompt.contains("Files: a.csv, b.json\n"));
    }

    #[test]
    fn test_chdir_prelude_quotes_path() {
        assert_eq!(
            chdir_prelude("/work \"dir\""),
            "import os\nos.chdir(\"/work \\\"dir\\\"\")\n"
        );
    }
}
