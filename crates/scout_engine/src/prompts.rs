const MAX_PROMPT_LINKS: usize = 120;

pub fn build_nav_prompt(link_texts: &[String]) -> String {
    let mut prompt = String::from(
        "You are seeing a clinic homepage. Identify the ONE best clickable element from the \
         navigation bar that will lead to a page listing doctors/staff (e.g., 'Our Team', \
         'Providers', 'Meet the Doctors'). If the link is inside a dropdown menu, reply using \
         the format 'Parent > Link' (for example, 'About Us > Our Team'). Otherwise, reply with \
         just the exact visible link text.",
    );
    if !link_texts.is_empty() {
        prompt.push_str("\n\nHere are the visible links on the page:\n");
        for text in link_texts.iter().take(MAX_PROMPT_LINKS) {
            prompt.push_str("- ");
            prompt.push_str(text);
            prompt.push('\n');
        }
    }
    prompt
}

pub fn build_staff_csv_prompt() -> String {
    "You are seeing the clinic's staff/providers page. Using ONLY what is visible in this \
     screenshot, return exactly ONE line in strict CSV format: Phone, First, Last, Doctors\n\
     \n\
     - Phone: the clinic phone number if visible, else leave empty.\n\
     - First, Last: the clinic OWNER's first and last names if visible; else use the first \
     doctor's name.\n\
     - Doctors: the NUMBER of DOCTORS listed on this page (exclude non-physician staff). This \
     field must be a numeric count with no words.\n\
     Return only the CSV line, with no labels or extra words."
        .to_string()
}
