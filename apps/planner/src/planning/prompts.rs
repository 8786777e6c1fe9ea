// All prompt text for the planning module.
// Prompts are written in Portuguese, the language of the source corpus and of
// the plans' readers. Builders only format; they never call the model.

use crate::catalog::cards::Card;

pub const REWRITE_JOB_INTRO: &str = "Faça uma breve descrição da seguinte vaga:";

pub const OBJECTIVES_AREAS_INTRO: &str =
    "A análise dessa vaga indica que o candidato deve ter conhecimento nas seguintes áreas:";
pub const OBJECTIVES_GOALS_INTRO: &str = "Espera-se que o candidato cumpra os seguintes objetivos:";
pub const OBJECTIVES_INSTRUCTION: &str = "Rescreva essas áreas e objetivos de modo ao candidato \
    poder identificar o que ele precisa alcançar.";

pub const COURSES_INTRO: &str = "A Alura possui um conjunto de ofertas de treinamento que podem \
    ajudar os candidatos a atingirem esses objetivos. A seguir, uma lista de cursos que podem ser \
    úteis para o candidato:";
pub const COURSES_INSTRUCTION: &str =
    "Promova esses treinamentos por meio de um plano de estudos e indique os hiperlinks.";

pub const STUDY_PLAN_OBJECTIVES_INSTRUCTION: &str =
    "Descreva todos os objetivos que deverão ser atingidos antes de se candidatar.";
pub const STUDY_PLAN_COURSES_INSTRUCTION: &str = "Inclua nesse plano as referências dos cursos da \
    Alura e informe os hiperlinks dos cursos nesse plano";

/// Prompt asking for a short rewrite of the job description. The text is
/// quoted verbatim.
pub fn rewrite_job_prompt(job_description: &str) -> String {
    format!("{REWRITE_JOB_INTRO}\n\n\"{job_description}\"\n\n")
}

/// Prompt listing the selected knowledge areas, then every key objective.
pub fn objectives_prompt(cards: &[Card]) -> String {
    let mut lines = vec![OBJECTIVES_AREAS_INTRO.to_string()];
    lines.extend(cards.iter().map(|c| format!("- {}", c.name())));

    lines.push(String::new());
    lines.push(OBJECTIVES_GOALS_INTRO.to_string());
    lines.extend(
        cards
            .iter()
            .flat_map(Card::key_objectives)
            .map(|o| format!("- {o}")),
    );

    lines.push(String::new());
    lines.push(OBJECTIVES_INSTRUCTION.to_string());
    lines.join("\n")
}

/// Prompt promoting the provider courses of the selected cards.
pub fn courses_prompt(cards: &[Card]) -> String {
    let mut lines = vec![COURSES_INTRO.to_string()];
    lines.extend(
        cards
            .iter()
            .flat_map(Card::courses)
            .map(|c| format!("- {} - {}", c.title(), c.link())),
    );
    lines.push(String::new());
    lines.push(COURSES_INSTRUCTION.to_string());
    lines.join("\n")
}

/// Consolidated study-plan prompt for the whole selection.
pub fn study_plan_prompt(job_description: &str, cards: &[Card]) -> String {
    format!(
        "Considere a oportunidade de trabalho \"{job_description}\", faça uma descrição sucinta \
        da área de conhecimento descrita a seguir e depois um passo-a-passo para um candidato.\
        \n\n{}\n\n{STUDY_PLAN_OBJECTIVES_INSTRUCTION}\n\n{STUDY_PLAN_COURSES_INSTRUCTION}",
        selection_content_prompt(cards)
    )
}

/// Study-plan prompt for a single card.
pub fn card_study_plan_prompt(job_description: &str, card: &Card) -> String {
    format!(
        "Considerando a oportunidade de trabalho \"{job_description}\", faça uma descrição \
        sucinta da área de conhecimento descrita a seguir e depois um passo-a-passo para um \
        candidato. Inclua nesse plano as referências e hyperlinks citados:\n\n{}",
        card_content_prompt(card)
    )
}

/// Describes one card: description, objectives, provider courses and the
/// remaining references.
pub fn card_content_prompt(card: &Card) -> String {
    let mut lines = vec![format!("Trata-se da área de conhecimento {}.", card.name())];

    if !card.short_description().is_empty() {
        lines.push(format!("Pode ser descrita como {}", card.short_description()));
    }
    if !card.key_objectives().is_empty() {
        lines.push("Para dominar essa área você deve:".to_string());
        lines.extend(card.key_objectives().iter().map(|o| format!("- {o}")));
    }
    if !card.additional_objectives().is_empty() {
        lines.push("Além disso, é importante:".to_string());
        lines.extend(card.additional_objectives().iter().map(|o| format!("- {o}")));
    }

    let courses: Vec<_> = card.courses().collect();
    if !courses.is_empty() {
        lines.push("Para esses temas a Alura oferece os seguintes cursos:".to_string());
        lines.extend(courses.iter().map(|c| format!("- {} - {}", c.title(), c.link())));
    }

    let references: Vec<_> = card
        .provider_resources()
        .iter()
        .chain(card.resources())
        .filter(|r| !r.is_course())
        .collect();
    if !references.is_empty() {
        lines.push("Recomenda-se também ver as seguintes referências:".to_string());
        lines.extend(references.iter().map(|r| format!("- {} - {}", r.title(), r.link())));
    }

    lines.join("\n")
}

/// Describes a card selection as a whole: names, descriptions, every key
/// objective and every provider course.
pub fn selection_content_prompt(cards: &[Card]) -> String {
    let names: Vec<&str> = cards.iter().map(Card::name).collect();
    let descriptions: Vec<&str> = cards
        .iter()
        .map(Card::short_description)
        .filter(|d| !d.is_empty())
        .collect();

    let mut lines = vec![
        format!("Trata-se das áreas de conhecimento: {}.", names.join("; ")),
        format!("Podem ser descritas como: {}", descriptions.join("; ")),
    ];

    if !cards.is_empty() {
        lines.push(
            "Os principais objetivos que deve atingir para estar capacitado para essa vaga são:"
                .to_string(),
        );
        lines.extend(
            cards
                .iter()
                .flat_map(Card::key_objectives)
                .map(|o| format!("- {o}")),
        );

        lines.push("Para esses temas a Alura oferece os seguintes cursos:".to_string());
        lines.extend(
            cards
                .iter()
                .flat_map(Card::courses)
                .map(|c| format!("- {} - {}", c.title(), c.link())),
        );
    }

    lines.join("\n")
}
