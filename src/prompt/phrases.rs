use super::AestheticPath;

pub struct PhraseTable {
    pub moods: &'static [&'static str],
    pub styles: &'static [&'static str],
}

pub fn table(path: AestheticPath) -> &'static PhraseTable {
    match path {
        AestheticPath::Tribal => &TRIBAL,
        AestheticPath::Natural => &NATURAL,
        AestheticPath::Industrial => &INDUSTRIAL,
        AestheticPath::MinimalAbstract => &MINIMAL_ABSTRACT,
        AestheticPath::HybridOrganicIndustrial => &HYBRID_ORGANIC_INDUSTRIAL,
        AestheticPath::DarkSurreal => &DARK_SURREAL,
        AestheticPath::PrimalWilderness => &PRIMAL_WILDERNESS,
        AestheticPath::CosmicNatural => &COSMIC_NATURAL,
        AestheticPath::ApocalypticVision => &APOCALYPTIC_VISION,
        AestheticPath::BiomorphicAbstraction => &BIOMORPHIC_ABSTRACTION,
        AestheticPath::MysticalEthereal => &MYSTICAL_ETHEREAL,
    }
}

static TRIBAL: PhraseTable = PhraseTable {
    moods: &[
        "a raw spirit evoking ancient, carved symbols",
        "a bold, primitive energy with weathered motifs",
        "an earthy pulse reminiscent of timeworn totems",
    ],
    styles: &[
        "bold, etched forms with rugged textures",
        "primitive patterns and rough, organic outlines",
        "abstract tribal motifs with a raw, artisanal feel",
    ],
};

static NATURAL: PhraseTable = PhraseTable {
    moods: &[
        "a deep, shadowed ambiance hinting at dark forests",
        "a misty, organic realm with muted natural hues",
        "an interplay of light and darkness found in wild landscapes",
    ],
    styles: &[
        "flowing organic shapes and subtle natural textures",
        "a softly rendered abstraction of forested vistas",
        "forms that evoke shadowed foliage and quiet natural beauty",
    ],
};

static INDUSTRIAL: PhraseTable = PhraseTable {
    moods: &[
        "a harsh, mechanical energy in a stark urban decay",
        "a cold, rugged mood with imposing, metallic undertones",
        "a gritty vibe where concrete and steel resonate",
    ],
    styles: &[
        "fragmented geometric forms with rough, metal textures",
        "industrial structures with a raw, hard-edged presence",
        "abstract urban decay with a futuristic, mechanical edge",
    ],
};

static MINIMAL_ABSTRACT: PhraseTable = PhraseTable {
    moods: &[
        "a spare, subtle calm in a world of soft shapes",
        "an understated, quiet ambiance that focuses on simplicity",
        "a gentle, muted presence with an elegant minimalism",
    ],
    styles: &[
        "delicate lines and minimal forms with restrained contrast",
        "sparse abstractions that emphasize negative space",
        "a refined, almost monochromatic interplay of form and void",
    ],
};

static HYBRID_ORGANIC_INDUSTRIAL: PhraseTable = PhraseTable {
    moods: &[
        "a dynamic tension where urban decay meets organic resilience",
        "a layered expression of mechanical grit softened by nature",
        "an interplay of raw industrial forms and reclaimed natural textures",
    ],
    styles: &[
        "rusted metals interwoven with natural, organic curves",
        "a striking synthesis of urban structures and wild, earthy patterns",
        "abstract forms where concrete rigidity blends with natural fluidity",
    ],
};

static DARK_SURREAL: PhraseTable = PhraseTable {
    moods: &[
        "a brooding, uncanny atmosphere of deep shadows",
        "an enigmatic gloom where reality blurs into dream",
        "a mysterious, almost dystopian quietude",
    ],
    styles: &[
        "ghostly silhouettes and distorted contours in low-key tones",
        "abstract, surreal forms with a stark, somber touch",
        "a collage of shadow and minimalistic detail evoking dark dreams",
    ],
};

static PRIMAL_WILDERNESS: PhraseTable = PhraseTable {
    moods: &[
        "a wild, untamed force echoing the raw pulse of nature",
        "an elemental, rugged spirit drawn from ancient woods",
        "a visceral energy that calls upon the primal earth",
    ],
    styles: &[
        "rough, organic textures with bold, earthy outlines",
        "abstract depictions of dense, ancient forests",
        "a raw portrayal of nature’s unbridled wilderness",
    ],
};

static COSMIC_NATURAL: PhraseTable = PhraseTable {
    moods: &[
        "a mysterious blend of celestial wonder and natural calm",
        "an enigmatic aura merging starlight with the earth’s depth",
        "a subtle interplay of cosmic and organic forces",
    ],
    styles: &[
        "delicate, astral shapes that flow into shadowed natural forms",
        "abstract contours that evoke both nebulae and deep forests",
        "a soft fusion of cosmic light and rugged nature",
    ],
};

static APOCALYPTIC_VISION: PhraseTable = PhraseTable {
    moods: &[
        "a stark, dystopian energy charged with desolation",
        "a heavy, brooding forewarning of collapse and decay",
        "a raw, ominous atmosphere of shattering reality",
    ],
    styles: &[
        "fragmented, harsh structures with a sense of ruin",
        "a grim abstraction of decaying urban landscapes",
        "rough, angular forms that evoke industrial collapse",
    ],
};

static BIOMORPHIC_ABSTRACTION: PhraseTable = PhraseTable {
    moods: &[
        "a fluid, evolving energy that mimics the forms of life",
        "an organic, pulsing rhythm reminiscent of living matter",
        "a subtle dance of shapes that hint at nature’s hidden geometry",
    ],
    styles: &[
        "soft, curving forms that echo cellular structures",
        "abstract, biomorphic lines that flow organically",
        "delicate shapes suggesting the secret patterns of growth",
    ],
};

static MYSTICAL_ETHEREAL: PhraseTable = PhraseTable {
    moods: &[
        "a dreamlike, intangible aura of quiet mystery",
        "an ethereal calm imbued with subtle spiritual nuance",
        "a softly luminous ambiance that whispers of ancient secrets",
    ],
    styles: &[
        "translucent, fading forms that drift in gentle space",
        "minimal, abstract silhouettes suffused with delicate light",
        "an understated abstraction that evokes a mystical quietude",
    ],
};
