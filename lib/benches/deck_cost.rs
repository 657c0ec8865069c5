#[macro_use]
extern crate criterion;

use criterion::Criterion;
use warlord::card::{Card, CardType};
use warlord::catalog::Catalog;
use warlord::cost::CostModel;
use warlord::deck::Deck;
use warlord::ledger::OwnedCards;

fn upgrade_chain(base_id: u32, name: &str, depth: u32) -> Vec<Card> {
  (0..depth)
    .map(|level| Card {
      id: base_id + level,
      name: name.to_string(),
      card_type: CardType::Assault,
      level: level + 1,
      cost: 25 * level,
      recipe: if level == 0 {
        Vec::new()
      } else {
        vec![(base_id + level - 1, 2)]
      },
      ..Card::default()
    })
    .collect()
}

fn criterion_function(c: &mut Criterion) {
  let mut cards = vec![Card {
    id: 1,
    name: "Warlord Kest".to_string(),
    card_type: CardType::Commander,
    ..Card::default()
  }];
  for line in 0..10 {
    cards.extend(upgrade_chain(100 + line * 10, &format!("Line {}", line), 6));
  }
  let catalog = Catalog::from_cards(cards).expect("catalog");
  let mut ledger = OwnedCards::new();
  ledger.add(1, 1);
  for line in 0..10 {
    ledger.add(100 + line * 10, 64);
  }
  // every slot holds a top-tier card that must resolve down to base cards
  let deck = Deck::new(1, (0..10).map(|line| 105 + line * 10).collect());
  let model = CostModel {
    catalog: &catalog,
    ledger: &ledger,
    use_ownership: true,
    endgame_level: 0,
  };
  c.bench_function("deck_cost full downgrade", move |b| {
    b.iter(|| model.deck_cost(&deck, 1_000_000))
  });
}

criterion_group!(benches, criterion_function);
criterion_main!(benches);
