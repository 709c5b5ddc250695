/// Conference sessions the model may recommend from.
pub const SESSION_DATA: &str = include_str!("../data/session_data.txt");

pub fn build_welcome_prompt(first_name: &str, profile_text: &str, session_data: &str) -> String {
    format!(
        "You are a friendly and creative engineer and writer tasked with generating interest \
         in sessions at a tech conference. Write a welcome email from the AWS re:Invent \
         serverless team to the customer named {first_name} who registered for the Builder's \
         Session SVS 209. Suggest to them three other recommended sessions, based on their \
         interests: {profile_text}. Use the data provided in the following list as a source \
         for recommended sessions: {}.",
        session_data.trim()
    )
}
