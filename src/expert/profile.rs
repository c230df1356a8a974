// src/expert/profile.rs
//! Per-domain prompts, messages, and embedded data tables.

use super::ExpertType;

#[derive(Debug)]
pub struct DomainProfile {
    pub kind: ExpertType,
    /// System prompt for direct AI generation.
    pub ai_system_prompt: &'static str,
    /// Appended to the query to bias web search toward the domain.
    pub search_suffix: &'static str,
    /// Instruction set for synthesizing an answer from web snippets.
    pub web_system_prompt: &'static str,
    pub fallback_message: &'static str,
    pub error_message: &'static str,
    pub knowledge_json: &'static str,
    pub sources_json: &'static str,
}

/// Validation instructions shared by all domains.
pub const VALIDATION_PROMPT: &str = "Web arama sonuçlarından üretilen yanıtın doğruluğunu kontrol et.
Yanıt güvenilir ve güncel bilgiler içeriyorsa onay ver.
Yanıt JSON formatında olmalı: {\"is_valid\": boolean, \"reason\": string}";

pub fn synthesis_user_prompt(query: &str, context: &str) -> String {
    format!(
        "Soru: {query}\n\nWeb arama sonuçları:\n{context}\n\nBu bilgileri kullanarak soruya yanıt ver."
    )
}

pub fn validation_user_prompt(answer: &str, context: &str) -> String {
    format!("Yanıt: {answer}\n\nKaynaklar:\n{context}")
}

/// Builds the five-rule synthesis instructions for a domain persona.
macro_rules! web_prompt {
    ($persona:literal) => {
        concat!(
            "Sen bir ",
            $persona,
            " uzmanısın. Web arama sonuçlarını kullanarak soruya kapsamlı ve doğru bir yanıt üretmelisin.
Yanıt üretirken şu kurallara uy:
1. Web arama sonuçlarındaki bilgilerin doğruluğunu kontrol et
2. Bilgilerin güncelliğini kontrol et
3. Çelişkili bilgiler varsa en güvenilir kaynağı seç
4. Emin olmadığın bilgileri verme
5. Yanıtı net ve anlaşılır bir şekilde ver"
        )
    };
}

pub static SPORTS: DomainProfile = DomainProfile {
    kind: ExpertType::Sports,
    ai_system_prompt: "You are a sports expert assistant. Provide accurate and helpful responses \
about sports, athletes, teams, competitions, rules, and sports history. If you're not confident \
about the answer, indicate that. Answer in the language of the question.",
    search_suffix: "spor haberleri güncel",
    web_system_prompt: web_prompt!("spor"),
    fallback_message: "Üzgünüm, spor sorunuza tatmin edici bir yanıt bulamadım. \
Sorunuzu farklı bir şekilde ifade edebilir veya biraz daha ayrıntı verebilir misiniz?",
    error_message: "Spor sorunuzu işlerken bir hata oluştu. Lütfen tekrar deneyin.",
    knowledge_json: include_str!("../../data/knowledge/sports.json"),
    sources_json: include_str!("../../data/sources/sports.json"),
};

pub static FOOD: DomainProfile = DomainProfile {
    kind: ExpertType::Food,
    ai_system_prompt: "You are a culinary expert assistant. Provide accurate and helpful responses \
about recipes, ingredients, cooking techniques, cuisines, and nutrition. If you're not confident \
about the answer, indicate that. Answer in the language of the question.",
    search_suffix: "yemek tarifi mutfak",
    web_system_prompt: web_prompt!("yemek ve mutfak"),
    fallback_message: "Üzgünüm, yemek sorunuza tatmin edici bir yanıt bulamadım. \
Sorunuzu farklı bir şekilde ifade edebilir veya biraz daha ayrıntı verebilir misiniz?",
    error_message: "Yemek sorunuzu işlerken bir hata oluştu. Lütfen tekrar deneyin.",
    knowledge_json: include_str!("../../data/knowledge/food.json"),
    sources_json: include_str!("../../data/sources/food.json"),
};

pub static AI: DomainProfile = DomainProfile {
    kind: ExpertType::Ai,
    ai_system_prompt: "You are an artificial intelligence expert assistant. Provide accurate and \
helpful responses about machine learning, deep learning, language models, AI tools, and AI \
research. If you're not confident about the answer, indicate that. Answer in the language of \
the question.",
    search_suffix: "yapay zeka teknoloji güncel",
    web_system_prompt: web_prompt!("yapay zeka"),
    fallback_message: "Üzgünüm, yapay zeka sorunuza tatmin edici bir yanıt bulamadım. \
Sorunuzu farklı bir şekilde ifade edebilir veya biraz daha ayrıntı verebilir misiniz?",
    error_message: "Yapay zeka sorunuzu işlerken bir hata oluştu. Lütfen tekrar deneyin.",
    knowledge_json: include_str!("../../data/knowledge/ai.json"),
    sources_json: include_str!("../../data/sources/ai.json"),
};

pub static SUDOSTAR: DomainProfile = DomainProfile {
    kind: ExpertType::SudoStar,
    ai_system_prompt: "You are the SudoStar product assistant. Answer questions about the SudoStar \
platform, its features, and its usage. Do not invent product details; if you're not confident \
about the answer, say so and suggest contacting SudoStar support. Answer in the language of the \
question.",
    search_suffix: "SudoStar",
    web_system_prompt: web_prompt!("SudoStar ürün"),
    fallback_message: "Üzgünüm, SudoStar ile ilgili sorunuza tatmin edici bir yanıt bulamadım. \
Sorunuzu farklı bir şekilde ifade edebilir veya biraz daha ayrıntı verebilir misiniz?",
    error_message: "SudoStar sorunuzu işlerken bir hata oluştu. Lütfen tekrar deneyin.",
    knowledge_json: include_str!("../../data/knowledge/sudostar.json"),
    sources_json: include_str!("../../data/sources/sudostar.json"),
};

pub fn profile_for(kind: ExpertType) -> &'static DomainProfile {
    match kind {
        ExpertType::Sports => &SPORTS,
        ExpertType::Food => &FOOD,
        ExpertType::Ai => &AI,
        ExpertType::SudoStar => &SUDOSTAR,
    }
}
