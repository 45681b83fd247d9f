use crate::models::{Order, Product};

/// Where the conversation controller puts what the user sees.
///
/// The controller owns no rendering detail; it only calls these in turn order.
pub trait DisplaySurface {
    fn append_user_message(&mut self, text: &str);
    fn append_bot_message(&mut self, text: &str);
    fn append_product_card(&mut self, product: &Product);
    /// Selecting a rendered order card re-enters the controller with
    /// [`order_prompt`].
    ///
    /// [`order_prompt`]: crate::controller::ConversationController::order_prompt
    fn append_order_card(&mut self, order: &Order);
    fn show_typing(&mut self);
    fn hide_typing(&mut self);
    fn show_notification(&mut self);
}
