use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Shape of the simulated catalogue and the limited resources behind it.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Products are numbered `1..=products`.
    pub products: u64,
    /// Options are numbered `1..=options` and spread round-robin over the products.
    pub options: u64,
    pub option_stock: u64,
    pub option_price: u64,
    /// Coupons are numbered `1..=coupons`.
    pub coupons: u64,
    pub coupon_quantity: u64,
    /// Added to every API response.
    pub latency: Duration,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            products: 5,
            options: 10,
            option_stock: 1_000,
            option_price: 10_000,
            coupons: 5,
            coupon_quantity: 100,
            latency: Duration::ZERO,
        }
    }
}

impl ShopConfig {
    #[must_use]
    pub fn with_coupon_quantity(mut self, quantity: u64) -> Self {
        self.coupon_quantity = quantity;
        self
    }

    #[must_use]
    pub fn with_option_stock(mut self, stock: u64) -> Self {
        self.option_stock = stock;
        self
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotFound,
    /// 409, the caller already holds the resource.
    Duplicate,
    /// 400, a limited resource ran out.
    Exhausted,
    /// 400, the request cannot be served for another reason.
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub kind: Rejection,
    pub message: &'static str,
}

fn reject(kind: Rejection, message: &'static str) -> Rejected {
    Rejected { kind, message }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: u64,
    pub name: String,
    pub option_ids: Vec<u64>,
    pub price: u64,
    pub sold: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: u64,
    pub user_id: u64,
    pub total_amount: u64,
    pub items: usize,
}

#[derive(Debug)]
struct CouponState {
    remaining: u64,
    holders: HashSet<u64>,
}

#[derive(Debug, Clone, Copy)]
struct CartLine {
    option_id: u64,
    quantity: u64,
}

#[derive(Debug)]
struct Inventory {
    stock: HashMap<u64, u64>,
    sold: HashMap<u64, u64>,
    balances: HashMap<u64, u64>,
    carts: HashMap<u64, Vec<CartLine>>,
    next_order_id: u64,
}

/// In-memory backend state.
///
/// Coupon issuance and order placement each run under one lock, so the simulated backend never
/// oversells stock or over-issues coupons no matter how many requests race.
#[derive(Debug)]
pub struct Shop {
    config: ShopConfig,
    coupons: Mutex<HashMap<u64, CouponState>>,
    inventory: Mutex<Inventory>,
}

impl Shop {
    pub fn new(config: ShopConfig) -> Self {
        let coupons = (1..=config.coupons)
            .map(|id| {
                (
                    id,
                    CouponState {
                        remaining: config.coupon_quantity,
                        holders: HashSet::new(),
                    },
                )
            })
            .collect();
        let stock = (1..=config.options)
            .map(|id| (id, config.option_stock))
            .collect();

        Self {
            config,
            coupons: Mutex::new(coupons),
            inventory: Mutex::new(Inventory {
                stock,
                sold: HashMap::new(),
                balances: HashMap::new(),
                carts: HashMap::new(),
                next_order_id: 1,
            }),
        }
    }

    pub fn config(&self) -> &ShopConfig {
        &self.config
    }

    fn product_of(&self, option_id: u64) -> u64 {
        ((option_id - 1) % self.config.products.max(1)) + 1
    }

    fn product_view(&self, id: u64, sold: &HashMap<u64, u64>) -> ProductView {
        let option_ids: Vec<u64> = (1..=self.config.options)
            .filter(|o| self.product_of(*o) == id)
            .collect();
        ProductView {
            id,
            name: format!("product-{id}"),
            sold: option_ids.iter().filter_map(|o| sold.get(o)).sum(),
            option_ids,
            price: self.config.option_price,
        }
    }

    pub fn products(&self, page: u64, size: u64) -> Vec<ProductView> {
        let inv = self.inventory.lock();
        (1..=self.config.products)
            .skip(usize::try_from(page.saturating_mul(size)).unwrap_or(usize::MAX))
            .take(usize::try_from(size).unwrap_or(usize::MAX))
            .map(|id| self.product_view(id, &inv.sold))
            .collect()
    }

    pub fn product(&self, id: u64) -> Result<ProductView, Rejected> {
        if id == 0 || id > self.config.products {
            return Err(reject(Rejection::NotFound, "product not found"));
        }
        let inv = self.inventory.lock();
        Ok(self.product_view(id, &inv.sold))
    }

    /// Best sellers first, ties by id.
    pub fn popular(&self, limit: usize) -> Vec<ProductView> {
        let inv = self.inventory.lock();
        let mut all: Vec<_> = (1..=self.config.products)
            .map(|id| self.product_view(id, &inv.sold))
            .collect();
        all.sort_by(|a, b| b.sold.cmp(&a.sold).then(a.id.cmp(&b.id)));
        all.truncate(limit);
        all
    }

    pub fn charge(&self, user_id: u64, amount: i64) -> Result<u64, Rejected> {
        let amount = u64::try_from(amount)
            .ok()
            .filter(|a| *a > 0)
            .ok_or_else(|| reject(Rejection::Invalid, "charge amount must be positive"))?;
        let mut inv = self.inventory.lock();
        let balance = inv.balances.entry(user_id).or_default();
        *balance = balance.saturating_add(amount);
        Ok(*balance)
    }

    pub fn add_to_cart(&self, user_id: u64, option_id: u64, quantity: u64) -> Result<usize, Rejected> {
        if option_id == 0 || option_id > self.config.options {
            return Err(reject(Rejection::NotFound, "product option not found"));
        }
        if quantity == 0 {
            return Err(reject(Rejection::Invalid, "quantity must be positive"));
        }
        let mut inv = self.inventory.lock();
        let cart = inv.carts.entry(user_id).or_default();
        match cart.iter_mut().find(|l| l.option_id == option_id) {
            Some(line) => line.quantity += quantity,
            None => cart.push(CartLine {
                option_id,
                quantity,
            }),
        }
        Ok(cart.len())
    }

    /// Places an order for the whole cart. Stock, balance and cart change together or not at all.
    pub fn place_order(&self, user_id: u64) -> Result<OrderView, Rejected> {
        let mut inv = self.inventory.lock();
        let lines = match inv.carts.get(&user_id) {
            Some(lines) if !lines.is_empty() => lines.clone(),
            _ => return Err(reject(Rejection::Invalid, "cart is empty")),
        };

        for line in &lines {
            let left = inv.stock.get(&line.option_id).copied().unwrap_or(0);
            if left < line.quantity {
                return Err(reject(Rejection::Exhausted, "insufficient stock quantity"));
            }
        }

        let total: u64 = lines
            .iter()
            .map(|l| l.quantity.saturating_mul(self.config.option_price))
            .sum();
        let balance = inv.balances.get(&user_id).copied().unwrap_or(0);
        if balance < total {
            return Err(reject(Rejection::Invalid, "insufficient balance"));
        }

        for line in &lines {
            if let Some(left) = inv.stock.get_mut(&line.option_id) {
                *left -= line.quantity;
            }
            *inv.sold.entry(line.option_id).or_default() += line.quantity;
        }
        inv.balances.insert(user_id, balance - total);
        inv.carts.remove(&user_id);

        let order_id = inv.next_order_id;
        inv.next_order_id += 1;
        Ok(OrderView {
            order_id,
            user_id,
            total_amount: total,
            items: lines.len(),
        })
    }

    /// Issues coupon `coupon_id` to `user_id`. Returns the issued user-coupon id.
    pub fn issue_coupon(&self, coupon_id: u64, user_id: u64) -> Result<u64, Rejected> {
        let mut coupons = self.coupons.lock();
        let coupon = coupons
            .get_mut(&coupon_id)
            .ok_or_else(|| reject(Rejection::NotFound, "coupon not found"))?;

        if coupon.holders.contains(&user_id) {
            return Err(reject(Rejection::Duplicate, "coupon already issued to this user"));
        }
        if coupon.remaining == 0 {
            return Err(reject(Rejection::Exhausted, "coupon sold out"));
        }
        coupon.remaining -= 1;
        coupon.holders.insert(user_id);
        Ok(coupon_id * 1_000_000 + coupon.holders.len() as u64)
    }

    pub fn coupons_issued(&self, coupon_id: u64) -> u64 {
        self.coupons
            .lock()
            .get(&coupon_id)
            .map_or(0, |c| c.holders.len() as u64)
    }

    pub fn stock_left(&self, option_id: u64) -> u64 {
        self.inventory
            .lock()
            .stock
            .get(&option_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn orders_placed(&self) -> u64 {
        self.inventory.lock().next_order_id - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_rejects_repeat_holders_before_checking_stock() {
        let shop = Shop::new(ShopConfig::default().with_coupon_quantity(1));
        assert!(shop.issue_coupon(1, 7).is_ok());
        assert_eq!(
            shop.issue_coupon(1, 7).map_err(|r| r.kind),
            Err(Rejection::Duplicate)
        );
        assert_eq!(
            shop.issue_coupon(1, 8).map_err(|r| r.kind),
            Err(Rejection::Exhausted)
        );
        assert_eq!(shop.coupons_issued(1), 1);
        assert_eq!(
            shop.issue_coupon(99, 1).map_err(|r| r.kind),
            Err(Rejection::NotFound)
        );
    }

    #[test]
    fn order_takes_stock_and_balance_together() {
        let shop = Shop::new(ShopConfig::default().with_option_stock(1));
        shop.charge(1, 1_000_000).unwrap_or_else(|e| panic!("{e:?}"));
        shop.add_to_cart(1, 3, 1).unwrap_or_else(|e| panic!("{e:?}"));
        let order = shop.place_order(1).unwrap_or_else(|e| panic!("{e:?}"));
        assert_eq!(order.total_amount, 10_000);
        assert_eq!(shop.stock_left(3), 0);

        shop.charge(2, 1_000_000).unwrap_or_else(|e| panic!("{e:?}"));
        shop.add_to_cart(2, 3, 1).unwrap_or_else(|e| panic!("{e:?}"));
        let err = shop.place_order(2).err().map(|r| r.message);
        assert_eq!(err, Some("insufficient stock quantity"));
        assert_eq!(shop.orders_placed(), 1);
    }

    #[test]
    fn order_without_funds_leaves_cart_and_stock_alone() {
        let shop = Shop::new(ShopConfig::default());
        shop.add_to_cart(5, 1, 2).unwrap_or_else(|e| panic!("{e:?}"));
        assert_eq!(
            shop.place_order(5).err().map(|r| r.message),
            Some("insufficient balance")
        );
        assert_eq!(shop.stock_left(1), 1_000);

        shop.charge(5, 20_000).unwrap_or_else(|e| panic!("{e:?}"));
        assert!(shop.place_order(5).is_ok());
        assert_eq!(
            shop.place_order(5).err().map(|r| r.message),
            Some("cart is empty")
        );
    }

    #[test]
    fn popular_orders_by_units_sold() {
        let shop = Shop::new(ShopConfig::default());
        shop.charge(1, 1_000_000).unwrap_or_else(|e| panic!("{e:?}"));
        shop.add_to_cart(1, 4, 3).unwrap_or_else(|e| panic!("{e:?}"));
        shop.place_order(1).unwrap_or_else(|e| panic!("{e:?}"));

        let popular = shop.popular(3);
        assert_eq!(popular.len(), 3);
        assert_eq!(popular[0].id, 4);
        assert_eq!(popular[0].sold, 3);
        assert_eq!(popular[1].id, 1);
    }

    #[test]
    fn product_pages_are_bounded_by_the_catalogue() {
        let shop = Shop::new(ShopConfig::default());
        assert_eq!(shop.products(0, 20).len(), 5);
        assert!(shop.products(1, 20).is_empty());
        assert_eq!(shop.products(1, 2).len(), 2);
        assert!(shop.product(6).is_err());
    }
}
