//! Canned texts for the two-button gestures.

use rand::{Rng, RngCore};

pub const FORTUNES: [&str; 20] = [
    "It is certain",
    "It is decidedly so",
    "Without a doubt",
    "Yes, definitely",
    "You may rely on it",
    "As I see it, yes",
    "Most likely",
    "Outlook good",
    "Yes",
    "Signs point to yes",
    "Reply hazy, try again",
    "Ask again later",
    "Better not tell you now",
    "Cannot predict now",
    "Concentrate and ask again",
    "Don't count on it",
    "My reply is no",
    "My sources say no",
    "Outlook not so good",
    "Very doubtful",
];

pub const CREDITS: &str = "Quotepad - live quotes courtesy of ZenQuotes.io";

/// One phrase, drawn uniformly.
pub fn pick<G: RngCore>(rng: &mut G) -> &'static str {
    FORTUNES[rng.gen_range(0..FORTUNES.len())]
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::*;

    #[test]
    fn picks_stay_in_the_list() {
        let mut rng = StepRng::new(0, 0x0F0F_0F0F_0F0F_0F0F);
        for _ in 0..64 {
            assert!(FORTUNES.contains(&pick(&mut rng)));
        }
        assert_eq!(pick(&mut StepRng::new(0, 0)), FORTUNES[0]);
    }
}
