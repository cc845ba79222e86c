use rand::Rng;

use super::catalog::Catalog;

pub const GRAPH_NODES: usize = 20;
pub const MAX_PLAYABLE: usize = 6;

/// One graph slot packed into a u32:
/// parent0/parent1/child0/child1 are 5-bit node indices, then a 10-bit card
/// id, a visible bit and a guild bit. `0x1F` / `0x3FF` are the invalid
/// sentinels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardNode(pub u32);

impl CardNode {
    pub const INVALID_NODE: u8 = 0x1F;
    pub const INVALID_CARD: u16 = 0x3FF;

    pub fn empty() -> CardNode {
        let mut n = CardNode(0);
        n.set_parent0(Self::INVALID_NODE);
        n.set_parent1(Self::INVALID_NODE);
        n.set_child0(Self::INVALID_NODE);
        n.set_child1(Self::INVALID_NODE);
        n.set_card(Self::INVALID_CARD);
        n
    }

    #[inline]
    fn get(self, shift: u32, mask: u32) -> u32 {
        (self.0 >> shift) & mask
    }

    #[inline]
    fn set(&mut self, shift: u32, mask: u32, value: u32) {
        debug_assert!(value <= mask);
        self.0 = (self.0 & !(mask << shift)) | (value << shift);
    }

    #[inline]
    pub fn parent0(self) -> u8 {
        self.get(0, 0x1F) as u8
    }

    #[inline]
    pub fn parent1(self) -> u8 {
        self.get(5, 0x1F) as u8
    }

    #[inline]
    pub fn child0(self) -> u8 {
        self.get(10, 0x1F) as u8
    }

    #[inline]
    pub fn child1(self) -> u8 {
        self.get(15, 0x1F) as u8
    }

    #[inline]
    pub fn card(self) -> u16 {
        self.get(20, 0x3FF) as u16
    }

    #[inline]
    pub fn visible(self) -> bool {
        self.get(30, 1) != 0
    }

    #[inline]
    pub fn is_guild(self) -> bool {
        self.get(31, 1) != 0
    }

    #[inline]
    pub fn set_parent0(&mut self, v: u8) {
        self.set(0, 0x1F, v as u32)
    }

    #[inline]
    pub fn set_parent1(&mut self, v: u8) {
        self.set(5, 0x1F, v as u32)
    }

    #[inline]
    pub fn set_child0(&mut self, v: u8) {
        self.set(10, 0x1F, v as u32)
    }

    #[inline]
    pub fn set_child1(&mut self, v: u8) {
        self.set(15, 0x1F, v as u32)
    }

    #[inline]
    pub fn set_card(&mut self, v: u16) {
        self.set(20, 0x3FF, v as u32)
    }

    #[inline]
    pub fn set_visible(&mut self, v: bool) {
        self.set(30, 1, v as u32)
    }

    #[inline]
    pub fn set_guild(&mut self, v: bool) {
        self.set(31, 1, v as u32)
    }

    #[inline]
    pub fn childless(self) -> bool {
        self.child0() == Self::INVALID_NODE && self.child1() == Self::INVALID_NODE
    }
}

/// One age's card layout plus the draw pools that back its face-down slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgeGraph {
    pub nodes: [CardNode; GRAPH_NODES],
    pub playable: [u8; MAX_PLAYABLE],
    pub num_playable: u8,
    pub age_pool: [u8; 23],
    pub num_age_pool: u8,
    pub guild_pool: [u8; 7],
    pub num_guild_pool: u8,
    pub age: u8,
}

impl AgeGraph {
    pub fn zeroed() -> AgeGraph {
        AgeGraph {
            nodes: [CardNode::empty(); GRAPH_NODES],
            playable: [0; MAX_PLAYABLE],
            num_playable: 0,
            age_pool: [0; 23],
            num_age_pool: 0,
            guild_pool: [0; 7],
            num_guild_pool: 0,
            age: 0,
        }
    }

    /// Age I: 5-row pyramid (widths 2..=6), the wide bottom row playable.
    pub fn age1<R: Rng>(catalog: &Catalog, rng: &mut R, resolve_all: bool) -> AgeGraph {
        let mut g = AgeGraph::zeroed();
        g.age = 0;
        let end = gen_pyramid(&mut g.nodes, 5, 0);
        for i in 0..6 {
            g.playable[g.num_playable as usize] = (end - 6 + i) as u8;
            g.num_playable += 1;
        }
        g.fill_pools(catalog, false);
        g.resolve_initial(catalog, rng, resolve_all);
        g
    }

    /// Age II: inverted pyramid (widths 6..=2), the narrow bottom playable.
    pub fn age2<R: Rng>(catalog: &Catalog, rng: &mut R, resolve_all: bool) -> AgeGraph {
        let mut g = AgeGraph::zeroed();
        g.age = 1;
        let end = gen_inverse_pyramid(&mut g.nodes, 6, 5, 0);
        for i in 0..2 {
            g.playable[g.num_playable as usize] = (end - 2 + i) as u8;
            g.num_playable += 1;
        }
        g.fill_pools(catalog, false);
        g.resolve_initial(catalog, rng, resolve_all);
        g
    }

    /// Age III: 3-row pyramid top, two face-down connector nodes, inverted
    /// pyramid tail; three random slots draw from the guild pool.
    pub fn age3<R: Rng>(catalog: &Catalog, rng: &mut R, resolve_all: bool) -> AgeGraph {
        let mut g = AgeGraph::zeroed();
        g.age = 2;

        let end = gen_pyramid(&mut g.nodes, 3, 0);
        let connect0 = end as u8;
        let connect1 = (end + 1) as u8;

        for &c in &[connect0, connect1] {
            g.nodes[c as usize] = CardNode::empty();
        }
        g.nodes[connect0 as usize].set_parent0(5);
        g.nodes[connect0 as usize].set_parent1(6);
        g.nodes[5].set_child1(connect0);
        g.nodes[6].set_child0(connect0);

        g.nodes[connect1 as usize].set_parent0(7);
        g.nodes[connect1 as usize].set_parent1(8);
        g.nodes[7].set_child1(connect1);
        g.nodes[8].set_child0(connect1);

        let end = gen_inverse_pyramid(&mut g.nodes, 4, 3, end + 2);

        g.nodes[connect0 as usize].set_child0(11);
        g.nodes[connect0 as usize].set_child1(12);
        g.nodes[11].set_parent1(connect0);
        g.nodes[12].set_parent0(connect0);

        g.nodes[connect1 as usize].set_child0(13);
        g.nodes[connect1 as usize].set_child1(14);
        g.nodes[13].set_parent1(connect1);
        g.nodes[14].set_parent0(connect1);

        // Three random guild slots.
        let mut tags = [false; GRAPH_NODES];
        tags[0] = true;
        tags[1] = true;
        tags[2] = true;
        for i in (1..GRAPH_NODES).rev() {
            tags.swap(i, rng.gen_range(0..=i));
        }
        for (node, &tag) in g.nodes.iter_mut().zip(tags.iter()) {
            node.set_guild(tag);
        }

        for i in 0..2 {
            g.playable[g.num_playable as usize] = (end - 2 + i) as u8;
            g.num_playable += 1;
        }
        g.fill_pools(catalog, true);
        g.resolve_initial(catalog, rng, resolve_all);
        g
    }

    fn fill_pools(&mut self, catalog: &Catalog, with_guilds: bool) {
        self.num_age_pool = catalog.age_card_count(self.age);
        for i in 0..self.num_age_pool {
            self.age_pool[i as usize] = i;
        }
        if with_guilds {
            self.num_guild_pool = catalog.guild_cards().len() as u8;
            for i in 0..self.num_guild_pool {
                self.guild_pool[i as usize] = i;
            }
        }
    }

    fn resolve_initial<R: Rng>(&mut self, catalog: &Catalog, rng: &mut R, resolve_all: bool) {
        for i in 0..GRAPH_NODES {
            if self.nodes[i].visible() || resolve_all {
                self.resolve_node(i, catalog, rng);
            }
        }
    }

    /// Draw a concrete card for a face-down slot from the matching pool.
    pub fn resolve_node<R: Rng>(&mut self, index: usize, catalog: &Catalog, rng: &mut R) {
        if self.nodes[index].card() != CardNode::INVALID_CARD {
            return;
        }
        let card_id = if self.nodes[index].is_guild() {
            let i = draw(&mut self.guild_pool, &mut self.num_guild_pool, rng);
            catalog.guild_card(i).id
        } else {
            let i = draw(&mut self.age_pool, &mut self.num_age_pool, rng);
            catalog.age_card(self.age, i).id
        };
        self.nodes[index].set_card(card_id as u16);
    }

    /// Swap-remove a playable slot, returning its node index.
    pub fn take_playable(&mut self, playable_index: u8) -> u8 {
        debug_assert!(playable_index < self.num_playable);
        let node = self.playable[playable_index as usize];
        self.playable
            .swap(playable_index as usize, self.num_playable as usize - 1);
        self.num_playable -= 1;
        node
    }

    /// Detach a just-taken node: parents losing their last child are
    /// revealed (drawing their card if face-down) and become playable.
    pub fn unlink<R: Rng>(&mut self, node_index: u8, catalog: &Catalog, rng: &mut R) {
        debug_assert!(self.nodes[node_index as usize].childless());

        let parents = [
            self.nodes[node_index as usize].parent0(),
            self.nodes[node_index as usize].parent1(),
        ];
        for parent in parents {
            if parent == CardNode::INVALID_NODE {
                continue;
            }
            let p = &mut self.nodes[parent as usize];
            if p.child0() == node_index {
                p.set_child0(CardNode::INVALID_NODE);
            }
            if p.child1() == node_index {
                p.set_child1(CardNode::INVALID_NODE);
            }
            if p.childless() {
                if !p.visible() {
                    self.resolve_node(parent as usize, catalog, rng);
                    self.nodes[parent as usize].set_visible(true);
                }
                self.playable[self.num_playable as usize] = parent;
                self.num_playable += 1;
            }
        }
    }

    /// How many face-down parents would be revealed by taking this playable.
    pub fn discoveries_if_picked(&self, playable_index: u8) -> u32 {
        debug_assert!(playable_index < self.num_playable);
        let node_index = self.playable[playable_index as usize];
        let node = self.nodes[node_index as usize];

        let mut discoveries = 0;
        let mut test_parent = |parent: u8| {
            if parent == CardNode::INVALID_NODE {
                return;
            }
            let p = self.nodes[parent as usize];
            if p.visible() {
                return;
            }
            let child0 = if p.child0() == node_index { CardNode::INVALID_NODE } else { p.child0() };
            let child1 = if p.child1() == node_index { CardNode::INVALID_NODE } else { p.child1() };
            if child0 == CardNode::INVALID_NODE && child1 == CardNode::INVALID_NODE {
                discoveries += 1;
            }
        };
        test_parent(node.parent0());
        debug_assert!(
            node.parent1() == CardNode::INVALID_NODE || node.parent1() != node.parent0()
        );
        test_parent(node.parent1());
        discoveries
    }

    pub fn playable(&self) -> &[u8] {
        &self.playable[..self.num_playable as usize]
    }

    /// Resolve every remaining face-down slot. After this there are no
    /// random draws left in the graph.
    pub fn resolve_all<R: Rng>(&mut self, catalog: &Catalog, rng: &mut R) {
        for i in 0..GRAPH_NODES {
            self.resolve_node(i, catalog, rng);
        }
    }
}

fn draw<const N: usize, R: Rng>(pool: &mut [u8; N], len: &mut u8, rng: &mut R) -> u8 {
    debug_assert!(*len > 0);
    let index = rng.gen_range(0..*len as usize);
    pool.swap(index, *len as usize - 1);
    *len -= 1;
    pool[*len as usize]
}

/// Rows of widths 2, 3, ... stacked downward; odd rows face-down.
fn gen_pyramid(nodes: &mut [CardNode; GRAPH_NODES], num_rows: usize, start: usize) -> usize {
    let mut prev_row_start = usize::MAX;
    let mut cur = start;

    for row in 0..num_rows {
        let width = 2 + row;
        for i in 0..width {
            let node = &mut nodes[cur + i];
            *node = CardNode::empty();
            node.set_visible(row % 2 == 0);

            if prev_row_start != usize::MAX {
                if i == 0 {
                    node.set_parent0(prev_row_start as u8);
                    nodes[prev_row_start].set_child0((cur + i) as u8);
                } else if i == width - 1 {
                    nodes[cur + i].set_parent0((prev_row_start + row) as u8);
                    nodes[prev_row_start + row].set_child1((cur + i) as u8);
                } else {
                    nodes[cur + i].set_parent0((prev_row_start + i - 1) as u8);
                    nodes[cur + i].set_parent1((prev_row_start + i) as u8);
                    nodes[prev_row_start + i - 1].set_child1((cur + i) as u8);
                    nodes[prev_row_start + i].set_child0((cur + i) as u8);
                }
            }
        }
        prev_row_start = cur;
        cur += width;
    }

    cur
}

/// Rows of widths base, base-1, ... narrowing downward; odd rows face-down.
fn gen_inverse_pyramid(
    nodes: &mut [CardNode; GRAPH_NODES],
    base: usize,
    num_rows: usize,
    start: usize,
) -> usize {
    let mut prev_row_start = usize::MAX;
    let mut cur = start;

    for row in 0..num_rows {
        let width = base - row;
        for i in 0..width {
            nodes[cur + i] = CardNode::empty();
            nodes[cur + i].set_visible(row % 2 == 0);

            if prev_row_start != usize::MAX {
                nodes[cur + i].set_parent0((prev_row_start + i) as u8);
                nodes[cur + i].set_parent1((prev_row_start + i + 1) as u8);
                nodes[prev_row_start + i].set_child1((cur + i) as u8);
                nodes[prev_row_start + i + 1].set_child0((cur + i) as u8);
            }
        }
        prev_row_start = cur;
        cur += width;
    }

    cur
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand_core::SeedableRng;

    /// Property-3 check: among nodes still on the board, the playable list
    /// is exactly the childless visible ones.
    fn playable_matches_childless_visible(g: &AgeGraph, present: &[bool; GRAPH_NODES]) -> bool {
        let mut expected: Vec<u8> = (0..GRAPH_NODES as u8)
            .filter(|&i| present[i as usize])
            .filter(|&i| g.nodes[i as usize].childless() && g.nodes[i as usize].visible())
            .collect();
        let mut playable: Vec<u8> = g.playable().to_vec();
        playable.sort_unstable();
        expected.sort_unstable();
        playable == expected
    }

    #[test]
    fn node_packing_roundtrip() {
        let mut n = CardNode::empty();
        assert_eq!(n.parent0(), CardNode::INVALID_NODE);
        assert_eq!(n.card(), CardNode::INVALID_CARD);
        n.set_parent0(3);
        n.set_parent1(17);
        n.set_child0(0);
        n.set_child1(CardNode::INVALID_NODE);
        n.set_card(512);
        n.set_visible(true);
        n.set_guild(true);
        assert_eq!(n.parent0(), 3);
        assert_eq!(n.parent1(), 17);
        assert_eq!(n.child0(), 0);
        assert_eq!(n.child1(), CardNode::INVALID_NODE);
        assert_eq!(n.card(), 512);
        assert!(n.visible());
        assert!(n.is_guild());
    }

    #[test]
    fn age1_shape() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let g = AgeGraph::age1(&cat, &mut rng, false);

        assert_eq!(g.num_playable, 6);
        // Bottom row nodes 14..20 are visible, childless, resolved.
        for i in 14..20 {
            assert!(g.nodes[i].visible());
            assert!(g.nodes[i].childless());
            assert_ne!(g.nodes[i].card(), CardNode::INVALID_CARD);
        }
        // Top row has no parents; second row is face-down and unresolved.
        assert_eq!(g.nodes[0].parent0(), CardNode::INVALID_NODE);
        for i in 2..5 {
            assert!(!g.nodes[i].visible());
            assert_eq!(g.nodes[i].card(), CardNode::INVALID_CARD);
        }
        assert_eq!(g.num_age_pool, 23 - 12); // 12 visible slots resolved
    }

    #[test]
    fn age2_shape() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(2);
        let g = AgeGraph::age2(&cat, &mut rng, false);
        assert_eq!(g.num_playable, 2);
        for i in 18..20 {
            assert!(g.nodes[i].visible());
            assert!(g.nodes[i].childless());
        }
        // The 6-wide top row has no parents.
        for i in 0..6 {
            assert_eq!(g.nodes[i].parent0(), CardNode::INVALID_NODE);
        }
    }

    #[test]
    fn age3_has_three_guild_slots() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(3);
        let g = AgeGraph::age3(&cat, &mut rng, false);
        let guilds = g.nodes.iter().filter(|n| n.is_guild()).count();
        assert_eq!(guilds, 3);
        assert_eq!(g.num_playable, 2);
    }

    #[test]
    fn taking_last_child_reveals_parent() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(4);
        let mut g = AgeGraph::age2(&cat, &mut rng, false);

        // Node 18's parents are the face-down nodes 15 and 16; 15 has no
        // other child, so taking 18 must reveal it.
        let mut present = [true; GRAPH_NODES];
        let node = g.take_playable(0);
        present[node as usize] = false;
        let parents = [g.nodes[node as usize].parent0(), g.nodes[node as usize].parent1()];
        g.unlink(node, &cat, &mut rng);

        let mut revealed = 0;
        for p in parents {
            let pn = g.nodes[p as usize];
            if pn.childless() {
                assert!(pn.visible());
                assert_ne!(pn.card(), CardNode::INVALID_CARD);
                assert!(g.playable().contains(&p));
                revealed += 1;
            }
        }
        assert_eq!(revealed, 1);
        assert!(playable_matches_childless_visible(&g, &present));
    }

    #[test]
    fn drain_age1_graph_keeps_playable_invariant() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(5);
        let mut g = AgeGraph::age1(&cat, &mut rng, false);

        let mut present = [true; GRAPH_NODES];
        let mut taken = 0;
        while g.num_playable > 0 {
            let node = g.take_playable(0);
            present[node as usize] = false;
            g.unlink(node, &cat, &mut rng);
            taken += 1;
            assert!(playable_matches_childless_visible(&g, &present));
        }
        assert_eq!(taken, GRAPH_NODES);
    }

    #[test]
    fn discoveries_counts_sole_hidden_parents() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(6);
        let mut g = AgeGraph::age1(&cat, &mut rng, false);

        // Corner of the bottom row has a single hidden parent shared with one
        // sibling; no discovery until the sibling is gone.
        let corner = 14u8;
        let idx = g.playable().iter().position(|&n| n == corner).unwrap() as u8;
        assert_eq!(g.discoveries_if_picked(idx), 0);

        let node = g.take_playable(idx);
        g.unlink(node, &cat, &mut rng);
        // Now node 15 is the only child of hidden node 9.
        let idx = g.playable().iter().position(|&n| n == 15).unwrap() as u8;
        assert_eq!(g.discoveries_if_picked(idx), 1);
    }

    #[test]
    fn determinized_graph_has_no_unresolved_cards() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut g = AgeGraph::age3(&cat, &mut rng, false);
        g.resolve_all(&cat, &mut rng);
        assert!(g.nodes.iter().all(|n| n.card() != CardNode::INVALID_CARD));
    }
}
